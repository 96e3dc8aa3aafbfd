use super::{ProcessCollector, ProcessInfo};
use crate::error::ReadError;
use std::collections::HashMap;
use std::ffi::CStr;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::trace;

/// Fields pulled out of `/proc/<pid>/stat`.
#[derive(Debug, PartialEq)]
struct StatFields {
    name: String,
    state: char,
    total_ticks: u64,
}

/// Reads `/proc` without keeping CPU state between calls: every
/// [`ProcessInfo`] carries cumulative CPU time, and callers measure usage
/// between two readings of their own.
pub struct LinuxProcessCollector {
    clock_ticks: u64,
    user_names: Mutex<HashMap<u32, String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LinuxProcessCollector {
    pub fn new() -> Self {
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        Self {
            clock_ticks: if clock_ticks > 0 { clock_ticks as u64 } else { 100 },
            user_names: Mutex::new(HashMap::new()),
        }
    }

    fn parse_process(&self, pid: u32) -> Result<ProcessInfo, ReadError> {
        let proc_dir = PathBuf::from(format!("/proc/{}", pid));

        let stat_content =
            fs::read_to_string(proc_dir.join("stat")).map_err(|e| ReadError::from_io(pid, e))?;
        let stat = parse_stat(&stat_content).ok_or(ReadError::Malformed { pid, what: "stat" })?;
        if stat.state == 'Z' {
            return Err(ReadError::Zombie(pid));
        }

        let cmdline_raw =
            fs::read(proc_dir.join("cmdline")).map_err(|e| ReadError::from_io(pid, e))?;
        let cmdline = split_cmdline(&cmdline_raw);
        if cmdline.is_empty() {
            // Kernel threads and exiting processes have no argv.
            return Err(ReadError::Malformed { pid, what: "cmdline" });
        }

        let status =
            fs::read_to_string(proc_dir.join("status")).map_err(|e| ReadError::from_io(pid, e))?;
        let uid = parse_uid(&status).ok_or(ReadError::Malformed { pid, what: "status" })?;
        let owner = self.user_name(uid);

        Ok(ProcessInfo {
            pid,
            name: stat.name,
            cmdline,
            owner,
            cpu_seconds: stat.total_ticks as f64 / self.clock_ticks as f64,
            sampled_at: Instant::now(),
        })
    }

    fn user_name(&self, uid: u32) -> String {
        let mut names = lock(&self.user_names);
        names
            .entry(uid)
            .or_insert_with(|| lookup_user_name(uid).unwrap_or_else(|| uid.to_string()))
            .clone()
    }
}

impl Default for LinuxProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessCollector for LinuxProcessCollector {
    fn list_processes(&self) -> Vec<ProcessInfo> {
        let mut processes = Vec::new();
        if let Ok(entries) = fs::read_dir("/proc") {
            for entry in entries.flatten() {
                let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok())
                else {
                    continue;
                };
                match self.parse_process(pid) {
                    Ok(info) => processes.push(info),
                    Err(e) => trace!("Skipping process: {}", e),
                }
            }
        }
        processes
    }

    fn get_process(&self, pid: u32) -> Result<ProcessInfo, ReadError> {
        self.parse_process(pid)
    }
}

/// The command name sits in parentheses and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
fn parse_stat(content: &str) -> Option<StatFields> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close < open {
        return None;
    }
    let name = content[open + 1..close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    // rest[0] is field 3 (state); utime and stime are fields 14 and 15.
    if rest.len() < 13 {
        return None;
    }
    let state = rest[0].chars().next()?;
    let utime: u64 = rest[11].parse().ok()?;
    let stime: u64 = rest[12].parse().ok()?;
    Some(StatFields {
        name,
        state,
        total_ticks: utime + stime,
    })
}

fn split_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

/// Real UID from the `Uid:` line of `/proc/<pid>/status`.
fn parse_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

fn lookup_user_name(uid: u32) -> Option<String> {
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            return None;
        }
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_stat_handles_spaces_in_name() {
        let line = "1234 (tmux: server) S 1 1234 1234 0 -1 4194560 1020 0 0 0 25 17 0 0 20 0 1 0 5309 9043968 1024 18446744073709551615";
        let stat = parse_stat(line).unwrap();
        assert_eq!(stat.name, "tmux: server");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.total_ticks, 42);
    }

    #[test]
    fn parse_stat_handles_parens_in_name() {
        let line = "77 (a) b) R 1 77 77 0 -1 0 0 0 0 0 100 50 0 0 20 0 1 0 1 1 1";
        let stat = parse_stat(line).unwrap();
        assert_eq!(stat.name, "a) b");
        assert_eq!(stat.state, 'R');
        assert_eq!(stat.total_ticks, 150);
    }

    #[test]
    fn parse_stat_rejects_truncated_line() {
        assert!(parse_stat("12 (x) S 1 2 3").is_none());
        assert!(parse_stat("garbage").is_none());
    }

    #[test]
    fn split_cmdline_drops_trailing_nul() {
        let args = split_cmdline(b"/usr/bin/redis-server\0127.0.0.1:6379\0");
        assert_eq!(args, vec!["/usr/bin/redis-server", "127.0.0.1:6379"]);
        assert!(split_cmdline(b"").is_empty());
    }

    #[test]
    fn parse_uid_reads_real_uid() {
        let status = "Name:\tmongod\nState:\tS (sleeping)\nUid:\t999\t999\t999\t999\nGid:\t999\t999\t999\t999\n";
        assert_eq!(parse_uid(status), Some(999));
        assert_eq!(parse_uid("Name:\tx\n"), None);
    }

    #[test]
    fn root_uid_resolves_to_root() {
        assert_eq!(lookup_user_name(0).as_deref(), Some("root"));
    }

    #[test]
    fn own_process_cpu_time_grows() {
        let collector = LinuxProcessCollector::new();
        let pid = std::process::id();
        let first = collector.get_process(pid).unwrap();
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(50) {
            std::hint::black_box(start.elapsed());
        }
        let second = collector.get_process(pid).unwrap();
        assert!(second.cpu_seconds >= first.cpu_seconds);
        assert!(second.sampled_at > first.sampled_at);
    }
}

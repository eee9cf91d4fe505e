//! Ansible play recaps and fatal task results found in the console log.
//!
//! Two recap layouts are recognised: the plain `PLAY RECAP` followed by
//! `TASK:` timings and a `Total` line, and the profile_tasks callback
//! output with a timestamped total and a `=` separator.
//!
//! A recap belongs to the first `PLAY [..]` header since the previous
//! recap line whose skipped lines can run into it: either the line just
//! before the recap is blank, or the header itself is that line. Each
//! recap is parsed on its own, so the work stays linear in the log size.

use std::sync::LazyLock;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::collector::Collection;
use crate::error::{GenerateError, GenerateResult};
use crate::plugin::EventGenerator;

const RECAP_MARKER: &str = "PLAY RECAP";

static RE_PLAY_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PLAY\s*\[(?P<play>.*)\]\s*\**\s*\n").unwrap());

// Hosts may run on past a later recap line, so this one sees the rest of the log
static RE_RECAP_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\A\s*PLAY RECAP \**\s*\n",
        r"(?P<hosts>(?:[^\s].*\n)*)",
        r"(?:\s*\n)*",
        r"(?P<tasks>(?:TASK:\s*.*\n)*)",
        r"(?:\s*\n)*",
        r"Total\s*[-]*\s*(?P<total>[^\s]*)s.*\n",
    ))
    .unwrap()
});

// Only sees the log up to the next recap line, which no host line may precede
static RE_PROFILE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\A\s*PLAY RECAP \**\s*\n",
        r"(?P<hosts>(?:.*\n)*?)",
        r"(?:\s*\n)+",
        r".*?\s+(?P<total>[^\s]+)\s+\*+\s*\n",
        r"\s*={79}\s*\n",
        r"(?P<tasks>(?:(?:.*\s:\s)?.*\s[0-9.]+s\s*\n)*)",
    ))
    .unwrap()
});

// e.g. "ssh-tunnel : Create the ssh-tunnel -------- 6.21s (not verified)"
static RE_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?P<task>.*?)\s+[-]*\s+(?P<time>[0-9.]+)s.*?\n").unwrap()
});

static RE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?P<host>[^\s]*)\s*:\s*(?P<status>.*?)\s*\n").unwrap());

// e.g. "fatal: [host]: FAILED! => {...}"; the status may span lines
static RE_FATAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ms)^fatal:\s*\[(?P<hostname>\S+)\]:\s*(?P<type>FAILED|UNREACHABLE)!\s*=>\s*(?P<error>\{.*?\})\s*$",
    )
    .unwrap()
});

// Status JSON is escaped before parsing so raw control characters survive
const STATUS_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'"')
    .remove(b':')
    .remove(b'{')
    .remove(b'}')
    .remove(b' ')
    .remove(b',')
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

// ── AnsibleRecapGenerator ─────────────────────────────────────

/// One event per host status line and per timed task of each play recap.
pub struct AnsibleRecapGenerator;

#[async_trait]
impl EventGenerator for AnsibleRecapGenerator {
    fn name(&self) -> &str {
        "ansible_recap"
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        recap_events(collection.console_log())
    }
}

/// Parse every recap block of `console`; plain recaps first, then profile
/// recaps, hosts before tasks within a block.
pub fn recap_events(console: &str) -> GenerateResult<Vec<Value>> {
    let console = esl_console::strip_ansi(console);
    let recaps = recap_lines(&console);
    let mut events = Vec::new();

    for (layout, tail, bounded) in [
        ("recap", &*RE_RECAP_TAIL, false),
        ("profile", &*RE_PROFILE_TAIL, true),
    ] {
        let blocks = recap_blocks(&console, &recaps, tail, bounded);
        tracing::debug!(layout, blocks = blocks.len(), "matched ansible recaps");
        for block in blocks {
            block_events(&block, &mut events)?;
        }
    }
    tracing::debug!(events = events.len(), "finished ansible recap events");
    Ok(events)
}

/// One matched recap: the play it belongs to and its raw sections.
#[derive(Debug, PartialEq)]
struct RecapBlock<'a> {
    play: &'a str,
    hosts: &'a str,
    tasks: &'a str,
    total: &'a str,
}

/// Start offsets of every line mentioning a play recap.
fn recap_lines(console: &str) -> Vec<usize> {
    let mut starts: Vec<usize> = console
        .match_indices(RECAP_MARKER)
        .map(|(i, _)| console[..i].rfind('\n').map_or(0, |nl| nl + 1))
        .collect();
    starts.dedup();
    starts
}

fn recap_blocks<'a>(
    console: &'a str,
    recaps: &[usize],
    tail: &Regex,
    bounded: bool,
) -> Vec<RecapBlock<'a>> {
    let mut blocks = Vec::new();
    let mut consumed = 0;
    for (k, &recap) in recaps.iter().enumerate() {
        let previous = if k == 0 { 0 } else { recaps[k - 1] };
        let from = previous.max(consumed);
        if from >= recap {
            continue;
        }
        let Some(play) = play_header(&console[from..recap]) else {
            continue;
        };
        let end = match recaps.get(k + 1) {
            Some(&next) if bounded => next,
            _ => console.len(),
        };
        let Some(caps) = tail.captures(&console[recap..end]) else {
            continue;
        };
        consumed = recap + caps.get(0).map_or(0, |m| m.end());
        let group = |name| caps.name(name).map_or("", |m| m.as_str());
        blocks.push(RecapBlock {
            play,
            hosts: group("hosts"),
            tasks: group("tasks"),
            total: group("total"),
        });
    }
    blocks
}

/// Name of the play whose header leads into the recap that follows `before`.
fn play_header(before: &str) -> Option<&str> {
    let blank_before_recap = before
        .strip_suffix('\n')
        .map(|body| body.rsplit('\n').next().unwrap_or(body))
        .is_some_and(|line| line.trim().is_empty());
    RE_PLAY_HEADER
        .captures_iter(before)
        .find(|caps| blank_before_recap || caps.get(0).is_some_and(|m| m.end() == before.len()))
        .and_then(|caps| caps.name("play"))
        .map(|m| m.as_str())
}

fn block_events(block: &RecapBlock<'_>, events: &mut Vec<Value>) -> GenerateResult<()> {
    let play = block.play;
    let total = play_total(block.total)?;

    for host in RE_HOST.captures_iter(block.hosts) {
        events.push(host_event(play, &host["host"], &host["status"], block.hosts)?);
    }
    for task in RE_TASK.captures_iter(block.tasks) {
        let time: f64 = task["time"]
            .parse()
            .map_err(|_| GenerateError::TotalTime(task["time"].to_string()))?;
        events.push(json!({
            "play": play,
            "total": total,
            "time_percentage": (time / total) * 100.0,
            "description": &task["task"],
            "time": time,
        }));
    }
    Ok(())
}

/// Seconds from `123.45` or `[H:]H:MM:SS.sss`.
fn play_total(raw: &str) -> GenerateResult<f64> {
    let bad = || GenerateError::TotalTime(raw.to_string());
    if !raw.contains(':') {
        return raw.parse().map_err(|_| bad());
    }
    let parts: Vec<&str> = raw.split(':').collect();
    let [.., hours, minutes, seconds] = parts.as_slice() else {
        return Err(bad());
    };
    let hours: i64 = hours.parse().map_err(|_| bad())?;
    let minutes: i64 = minutes.parse().map_err(|_| bad())?;
    let seconds: f64 = seconds.parse().map_err(|_| bad())?;
    let whole = hours
        .checked_mul(3600)
        .zip(minutes.checked_mul(60))
        .and_then(|(h, m)| h.checked_add(m))
        .ok_or_else(bad)?;
    Ok(whole as f64 + seconds)
}

fn host_event(play: &str, host: &str, status: &str, hosts: &str) -> GenerateResult<Value> {
    let mut event = Map::new();
    event.insert("play".into(), play.into());
    event.insert("host".into(), host.into());
    for token in status.split_whitespace() {
        let bad = || {
            tracing::error!(hosts, "bad status match in hosts");
            GenerateError::HostStatus {
                token: token.to_string(),
                hosts: hosts.to_string(),
            }
        };
        let (key, count) = token.split_once('=').ok_or_else(bad)?;
        let count: i64 = count.parse().map_err(|_| bad())?;
        event.insert(key.to_string(), count.into());
    }
    Ok(Value::Object(event))
}

// ── AnsibleFatalGenerator ─────────────────────────────────────

/// One event per `fatal: [host]: FAILED!|UNREACHABLE! => {...}` line.
pub struct AnsibleFatalGenerator;

#[async_trait]
impl EventGenerator for AnsibleFatalGenerator {
    fn name(&self) -> &str {
        "ansible_fatal"
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        Ok(fatal_events(collection.console_log()))
    }
}

/// Status objects that fail to parse are kept verbatim under `bad_data`.
pub fn fatal_events(console: &str) -> Vec<Value> {
    let events: Vec<Value> = RE_FATAL
        .captures_iter(console)
        .map(|caps| {
            let error = &caps["error"];
            let escaped = utf8_percent_encode(error, STATUS_ESCAPE).to_string();
            let mut event = json!({
                "hostname": &caps["hostname"],
                "type": &caps["type"],
            });
            match serde_json::from_str::<Value>(&escaped) {
                Ok(data) => event["data"] = data,
                Err(e) => {
                    tracing::debug!(error = %e, "unparseable ansible status");
                    event["bad_data"] = error.into();
                }
            }
            event
        })
        .collect();
    tracing::debug!(events = events.len(), "finished ansible fatal events");
    events
}

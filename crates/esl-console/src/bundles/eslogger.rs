//! General Jenkins and Docker console patterns.

use crate::catalogue::{PatternCatalogue, RegexBundle};

// (event name, pattern). Names repeat where several shapes describe one problem.
const PATTERNS: &[(&str, &str)] = &[
    // ── Pipeline job information ──────────────────────────────
    (
        "jenkins agent",
        r"Running on (?P<jenkins_agent>.*?) in (?P<workspace>/.*?)\s*\n+",
    ),
    (
        "stopwatch",
        r"stopwatch - name:(?P<name>.*?), elapsedTime:(?P<elapsed_time>.*?), startTime:(?P<start_time>.*?), endTime:(?P<end_time>.*?), status:(?P<status>.*?)\s*\n+",
    ),
    // ── Docker errors ─────────────────────────────────────────
    (
        "docker error",
        r"Error response from daemon:(?P<docker_error>.*?)\n+",
    ),
    (
        "docker blob error",
        r"\n(?P<preceding>.*?)\n^(?P<blob>.*unknown blob.*)$",
    ),
    (
        "docker timeout",
        r"Error response from daemon:(?P<err>.*?)net/http: request canceled \(Client\.Timeout exceeded while awaiting headers\)",
    ),
    (
        "docker missing signature",
        r"Error response from daemon: missing signature key",
    ),
    (
        "docker image not found",
        r"Pulling repository (?P<docker_repository>\S+)\nError: image (?P<docker_image>\S+) not found",
    ),
    (
        "docker image not found",
        r"Error: image (?P<image>\S+) not found",
    ),
    (
        "docker pull error",
        r"Error pulling image \((?P<docker_tag>\S+)\) from (?P<docker_registry>\S+), endpoint: (?P<docker_endpoint>\S+), (?P<error>.*?)\n",
    ),
    (
        "docker pull error",
        r"Please login prior to pull:(?:\s*?\n*)*?Error: Cannot perform an interactive login from a non TTY device",
    ),
    (
        "http_status",
        r"received unexpected HTTP status:(?P<http_status>.*?)\n+",
    ),
    (
        "thin pool full",
        r"devmapper: Thin Pool has [0-9]+ free data blocks which is less than minimum required [0-9]+ free data blocks. Create more free space in thin pool or use dm.min_free_space option to change behavior",
    ),
    // ── Docker informational ──────────────────────────────────
    ("reclaimed space", r"Total reclaimed space.*?B"),
    // ── Unclassified ──────────────────────────────────────────
    (
        "stdout temporarily unavailable",
        r"/dev/stdout: resource temporarily unavailable",
    ),
    // ── Generic Jenkins errors ────────────────────────────────
    (
        "java exception",
        r"^(?P<exception>java[.].*Exception):\s*(?P<exception_text>.*?)$",
    ),
    ("jenkins error", r"^ERROR:\s*(?P<error_text>.*?)\n.*?\n+"),
    ("jenkins fatal error", r"^FATAL:\s*(?P<fatal_text>.*?)\n.*?\n+"),
    (
        "remote file operation failed",
        r"^remote file operation failed:\s*(?P<remote_fail_text>.*?)\n.*?\n+",
    ),
];

/// Agent, stopwatch, Docker and Jenkins error patterns.
pub struct EsLoggerRegexBundle;

impl RegexBundle for EsLoggerRegexBundle {
    fn name(&self) -> &str {
        "eslogger"
    }

    fn get_regex(&self, catalogue: &mut PatternCatalogue) {
        for (name, pattern) in PATTERNS {
            catalogue.push_builtin(name, pattern);
        }
    }
}

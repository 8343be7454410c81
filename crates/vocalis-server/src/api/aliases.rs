//! Primary endpoint paths and the alias paths served by the same handler

/// Primary path followed by its aliases
pub const ENDPOINT_ALIASES: &[(&str, &[&str])] = &[
    ("/audio/speech", &["/v1/audio/speech", "/tts"]),
    ("/audio/speech/upload", &["/v1/audio/speech/upload", "/tts/upload"]),
    ("/audio/speech/stream", &["/v1/audio/speech/stream", "/tts/stream"]),
    (
        "/audio/speech/stream/upload",
        &["/v1/audio/speech/stream/upload", "/tts/stream/upload"],
    ),
    ("/health", &["/v1/health"]),
    ("/ping", &["/v1/ping"]),
    ("/status", &["/v1/status", "/processing", "/processing/status"]),
    ("/status/progress", &["/v1/status/progress", "/progress"]),
    ("/status/history", &["/v1/status/history", "/history"]),
    ("/status/statistics", &["/v1/status/statistics", "/stats"]),
    ("/status/history/clear", &["/v1/status/history/clear"]),
    ("/info", &["/v1/info", "/api/info"]),
    ("/config", &["/v1/config"]),
    ("/endpoints", &["/v1/endpoints", "/routes"]),
    ("/models", &["/v1/models"]),
];

/// Aliases registered for `primary`, empty when it has none
pub fn aliases_for(primary: &str) -> &'static [&'static str] {
    ENDPOINT_ALIASES
        .iter()
        .find(|(path, _)| *path == primary)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// `primary` followed by its aliases
pub fn all_paths(primary: &'static str) -> impl Iterator<Item = &'static str> {
    std::iter::once(primary).chain(aliases_for(primary).iter().copied())
}

use tracing_subscriber::fmt::format::FmtSpan;

pub fn setup(env_filter: &str) {
    tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW)
        .with_target(false)
        .with_env_filter(env_filter)
        .compact()
        .init();
}

// The kube client logs every failed request at debug/warn level, and the watchers already report
// those failures themselves, so by default we only let through the client's warnings.
pub fn default_filter(verbosity: &str) -> String {
    if verbosity.contains("kube") {
        verbosity.into()
    } else {
        format!("{verbosity},kube=warn")
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::plain("info", "info,kube=warn")]
    #[case::with_targets("debug,hyper=info", "debug,hyper=info,kube=warn")]
    #[case::kube_override("info,kube=debug", "info,kube=debug")]
    fn test_default_filter(#[case] verbosity: &str, #[case] expected: &str) {
        assert_eq!(default_filter(verbosity), expected);
    }
}

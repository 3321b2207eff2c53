#[test]
fn tracing_feature_gating_compiles() {
    #[cfg(feature = "tracing")]
    {
        // A second init must be a no-op rather than a "global subscriber already set" panic.
        rowpipe::logging::init("rowpipe=debug");
        rowpipe::logging::init("not a valid directive [");
        tracing::event!(
            tracing::Level::DEBUG,
            event = "rowpipe.test.feature_gating",
            "rowpipe.test.feature_gating"
        );
    }

    #[cfg(not(feature = "tracing"))]
    {
        let marker = "tracing-disabled";
        assert_eq!(marker, "tracing-disabled");
    }
}

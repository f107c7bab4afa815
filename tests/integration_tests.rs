mod integration {
    mod archive_tests;
    mod clean_tests;
    mod config_tests;
    mod diff_tests;
    mod error_continuation_tests;
}

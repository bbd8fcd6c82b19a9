/*
Shared logger setup for the commander binaries.

Console output is level-filtered per invocation (quiet for operations, noisy
for debugging), while two files under the given log directory keep the full
trace and a warn/error digest of every session.
*/

use log::LevelFilter;
use log4rs::filter::threshold::ThresholdFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

fn configure_logger(console_level: LevelFilter, log_path: &str) -> Config {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
        .build();
    let stdout = Appender::builder()
        .filter(Box::new(ThresholdFilter::new(console_level)))
        .build("stdout", Box::new(stdout));

    let all_file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} - {l} - {m}{n}")))
        .build(format!("{}/all_logs.log", log_path))
        .unwrap();

    let filtered_file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} - {l} - {m}{n}")))
        .build(format!("{}/error_and_warning_logs.log", log_path))
        .unwrap();
    let filtered_file = Appender::builder()
        .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
        .build("filtered_file", Box::new(filtered_file));

    Config::builder()
        .appender(stdout)
        .appender(Appender::builder().build("all_file", Box::new(all_file)))
        .appender(filtered_file)
        .build(
            Root::builder()
                .appender("stdout")
                .appender("all_file")
                .appender("filtered_file")
                .build(LevelFilter::Trace),
        )
        .unwrap()
}

/// Init the process-wide logger. Call once, first thing in main.
pub fn init_logger(log_path: &str, console_level: LevelFilter) {
    let config = configure_logger(console_level, log_path);
    let _handle = log4rs::init_config(config).unwrap();
}

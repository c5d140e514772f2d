use clap::ValueEnum;

/// Output format for llm-eval commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    #[default]
    Human,
    /// JSON on stdout, errors as JSON envelopes on stderr
    Json,
}

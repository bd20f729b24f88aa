// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{fmt, sync::Once};
use tracing::{Event, Level, Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Overrides the log filter with `target=level` directives.
const LOG_ENV: &str = "WATCHMARK_LOG";

#[derive(Copy, Clone, Debug, Args)]
pub(crate) struct OutputOpts {
    /// Verbose output
    #[arg(long, short, global = true, env = "WATCHMARK_VERBOSE")]
    verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "WATCHMARK_COLOR"
    )]
    color: Color,
}

impl OutputOpts {
    /// Installs the stderr logger and returns the context for everything else.
    pub(crate) fn init(self) -> OutputContext {
        init_logging(self.verbose, self.color.should_colorize(supports_color::Stream::Stderr));
        OutputContext {
            verbose: self.verbose,
            color: self.color,
        }
    }
}

/// How output should be produced, as selected on the command line.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns the styles for error messages on stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            StderrStyles {
                bold: style().bold(),
                warning_text: style().yellow(),
            }
        } else {
            StderrStyles::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Self::Auto => supports_color::on_cached(stream).is_some(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Styles for messages written to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) warning_text: Style,
}

fn init_logging(verbose: bool, colorize: bool) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let default = Targets::new().with_default(if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        });
        let directives = std::env::var(LOG_ENV).unwrap_or_default();
        let parsed = (!directives.is_empty()).then(|| directives.parse::<Targets>());

        let layer = tracing_subscriber::fmt::layer()
            .event_format(LevelHeading { colorize })
            .with_writer(std::io::stderr)
            .with_filter(match &parsed {
                Some(Ok(targets)) => targets.clone(),
                _ => default,
            });
        tracing_subscriber::registry().with(layer).init();

        if let Some(Err(error)) = parsed {
            tracing::warn!("ignoring invalid {LOG_ENV} value `{directives}`: {error}");
        }
    });
}

/// Formats events as `level: message`, like compiler diagnostics.
struct LevelHeading {
    colorize: bool,
}

impl<S, N> FormatEvent<S, N> for LevelHeading
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let (heading, heading_style) = match *event.metadata().level() {
            Level::ERROR => ("error", style().red().bold()),
            Level::WARN => ("warning", style().yellow().bold()),
            Level::INFO => ("info", style().bold()),
            Level::DEBUG => ("debug", style().bold()),
            Level::TRACE => ("trace", style().dimmed()),
        };
        let heading_style = if self.colorize {
            heading_style
        } else {
            Style::new()
        };

        write!(writer, "{}: ", heading.style(heading_style))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

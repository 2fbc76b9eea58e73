use crate::{AxmlConverter, AxmlError, DecoderOptions, OutputFormat, Result, Utf8Lengths};
use clap::{Arg, ArgAction, Command, value_parser};

pub struct Cli;

impl Cli {
    pub fn build_command() -> Command {
        Command::new("axmlview")
            .about("Decodes Android Binary XML (AXML) into readable text")
            .long_about("Decodes compiled Android XML such as AndroidManifest.xml.\n\nInput can be '-' to use stdin, and output can be '-' or omitted to use stdout.")
            .arg(
                Arg::new("input")
                    .help("Input file path (use '-' for stdin)")
                    .required(true)
                    .index(1),
            )
            .arg(
                Arg::new("output")
                    .help("Output file path (use '-' for stdout)")
                    .index(2),
            )
            .arg(
                Arg::new("format")
                    .short('f')
                    .long("format")
                    .help("Output rendering")
                    .value_parser(value_parser!(OutputFormat))
                    .default_value("xml"),
            )
            .arg(
                Arg::new("utf8-lengths")
                    .long("utf8-lengths")
                    .help("How UTF-8 string length prefixes are read; compat only suits single-prefix pools")
                    .value_parser(value_parser!(Utf8Lengths))
                    .default_value("android"),
            )
            .arg(
                Arg::new("strict")
                    .long("strict")
                    .help("Fail on reserved fields that are not 0xFFFFFFFF")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase log verbosity (repeat for more)")
                    .action(ArgAction::Count),
            )
    }

    /// Log level selected by `-v` flags
    pub fn log_level(matches: &clap::ArgMatches) -> log::LevelFilter {
        match matches.get_count("verbose") {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    pub fn converter(matches: &clap::ArgMatches) -> AxmlConverter {
        let format = matches
            .get_one::<OutputFormat>("format")
            .copied()
            .unwrap_or_default();
        let options = DecoderOptions {
            utf8_lengths: matches
                .get_one::<Utf8Lengths>("utf8-lengths")
                .copied()
                .unwrap_or_default(),
            strict_sentinels: matches.get_flag("strict"),
        };
        AxmlConverter::new(format, options)
    }

    pub fn run_with_matches(matches: clap::ArgMatches) -> Result<()> {
        let input_path = matches
            .get_one::<String>("input")
            .ok_or_else(|| AxmlError::ParseError("Missing input path".to_string()))?;
        let output_path = matches
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("-");

        if input_path != "-" && input_path == output_path {
            return Err(AxmlError::ParseError(
                "Refusing to overwrite the input file with its own rendering".to_string(),
            ));
        }

        let converter = Self::converter(&matches);
        match (input_path.as_str(), output_path) {
            ("-", "-") => converter.convert_stdin_stdout(),
            ("-", output) => converter.convert_stdin_to_file(output),
            (input, "-") => converter.convert_file_to_stdout(input),
            (input, output) => converter.convert_file(input, output),
        }
    }
}

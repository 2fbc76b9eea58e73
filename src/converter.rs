use crate::{AxmlDecoder, DecoderOptions, DumpSink, Result, XmlSink};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};

/// Text rendering produced by [`AxmlConverter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Reconstructed XML document
    #[default]
    Xml,
    /// One line per decoded event
    Events,
}

/// High-level converter from AXML to text
#[derive(Debug, Clone, Copy, Default)]
pub struct AxmlConverter {
    pub format: OutputFormat,
    pub options: DecoderOptions,
}

impl AxmlConverter {
    pub fn new(format: OutputFormat, options: DecoderOptions) -> Self {
        Self { format, options }
    }

    /// Convert AXML from a reader to a writer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use axmlview::AxmlConverter;
    /// use std::fs::File;
    ///
    /// let input = File::open("AndroidManifest.xml").unwrap();
    /// let output = File::create("AndroidManifest.txt").unwrap();
    /// AxmlConverter::default().convert(input, output).unwrap();
    /// ```
    pub fn convert<R: Read, W: Write>(&self, reader: R, writer: W) -> Result<()> {
        let mut decoder = AxmlDecoder::with_options(reader, self.options);
        match self.format {
            OutputFormat::Xml => {
                let mut sink = XmlSink::new(writer)?;
                decoder.decode(&mut sink)?;
                sink.finish()?;
            }
            OutputFormat::Events => {
                let mut sink = DumpSink::new(writer);
                let result = decoder.decode(&mut sink);
                sink.into_inner().flush()?;
                result?;
            }
        }
        Ok(())
    }

    /// Convert an AXML file to a text file
    pub fn convert_file(&self, input_path: &str, output_path: &str) -> Result<()> {
        let reader = BufReader::new(File::open(input_path)?);
        let writer = BufWriter::new(File::create(output_path)?);
        self.convert(reader, writer)
    }

    /// Convert an AXML file to stdout
    pub fn convert_file_to_stdout(&self, input_path: &str) -> Result<()> {
        let reader = BufReader::new(File::open(input_path)?);
        let stdout = io::stdout();
        self.convert(reader, BufWriter::new(stdout.lock()))
    }

    /// Convert AXML from stdin to stdout
    ///
    /// ```no_run
    /// use axmlview::AxmlConverter;
    ///
    /// // cat AndroidManifest.xml | axmlview -
    /// AxmlConverter::default().convert_stdin_stdout().unwrap();
    /// ```
    pub fn convert_stdin_stdout(&self) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.convert(stdin.lock(), BufWriter::new(stdout.lock()))
    }

    /// Convert AXML from stdin to a file
    pub fn convert_stdin_to_file(&self, output_path: &str) -> Result<()> {
        let stdin = io::stdin();
        let writer = BufWriter::new(File::create(output_path)?);
        self.convert(stdin.lock(), writer)
    }

    /// Convert in-memory AXML data to an XML string with default options
    ///
    /// ```no_run
    /// use axmlview::AxmlConverter;
    ///
    /// let data = std::fs::read("AndroidManifest.xml").unwrap();
    /// println!("{}", AxmlConverter::convert_bytes(&data).unwrap());
    /// ```
    pub fn convert_bytes(data: &[u8]) -> Result<String> {
        let mut output = Vec::new();
        Self::default().convert(Cursor::new(data), &mut output)?;
        String::from_utf8(output)
            .map_err(|_| crate::AxmlError::ParseError("Invalid UTF-8 in output".to_string()))
    }
}

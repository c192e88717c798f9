//! Gzip-transparent, stdin-capable I/O, in the same layered style as
//! `irma-core`'s `io::readers`/`io::writers` (`ReadFileZip`,
//! `ReadFileStdin`, `WriteFileZipStdout`), built with this codebase's own
//! `define_whichever` macro (see `utils::whichever`) rather than pulling in
//! an alignment-focused crate for it.

use crate::utils::whichever::define_whichever;
use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use std::{
    fs::File,
    io::{BufWriter, Read, Stdin, Stdout, Write, stdin, stdout},
    path::Path,
};

fn is_gz(path: impl AsRef<Path>) -> bool {
    path.as_ref().extension().is_some_and(|ext| ext == "gz")
}

define_whichever! {
    /// A regular file or one transparently decoded with
    /// [gzip](https://www.rfc-editor.org/rfc/rfc1952#page-5), chosen by the
    /// `.gz` extension.
    pub enum ReadFileZip {
        File(File),
        Zipped(MultiGzDecoder<File>),
    }

    impl Read for ReadFileZip {}
}

impl ReadFileZip {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(&path)?;
        if is_gz(&path) {
            Ok(Self::Zipped(MultiGzDecoder::new(file)))
        } else {
            Ok(Self::File(file))
        }
    }
}

define_whichever! {
    /// The main alignment input: a [`ReadFileZip`] for a path, or
    /// [`Stdin`] when no path was given (spelled `-` on the command line).
    pub enum ReadInput {
        Plain(ReadFileZip),
        FromStdin(Stdin),
    }

    impl Read for ReadInput {}
}

impl ReadInput {
    pub fn open(path: &str) -> std::io::Result<Self> {
        if path == "-" {
            Ok(Self::FromStdin(stdin()))
        } else {
            Ok(Self::Plain(ReadFileZip::open(path)?))
        }
    }
}

define_whichever! {
    /// A regular file, gzip-compressed file, or stdout, chosen by whether a
    /// path was given and whether it ends in `.gz`.
    #[derive(Debug)]
    pub enum WriteFileZipStdout {
        File(BufWriter<File>),
        Zipped(GzEncoder<BufWriter<File>>),
        Stdout(BufWriter<Stdout>),
    }

    impl Write for WriteFileZipStdout {}
}

impl WriteFileZipStdout {
    pub fn create(path: Option<impl AsRef<Path>>) -> std::io::Result<Self> {
        let writer = match path {
            Some(path) => {
                let file = File::create(&path)?;
                let buffered = BufWriter::new(file);
                if is_gz(&path) {
                    Self::Zipped(GzEncoder::new(buffered, Compression::default()))
                } else {
                    Self::File(buffered)
                }
            }
            None => Self::Stdout(BufWriter::new(stdout())),
        };
        Ok(writer)
    }
}

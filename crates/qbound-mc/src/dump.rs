//! Plain-text dumps of visited states and investigation findings.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Line written after every dumped state.
pub const SEPARATOR: &str = "==================================================";

/// Where and what to dump.
#[derive(Debug, Clone, Default)]
pub struct DumpConfig {
    /// Output directory. Competitor files are written here whenever set.
    pub dir: Option<PathBuf>,
    /// Whether each run writes its visited states and abstract successors.
    pub states: bool,
}

impl DumpConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            states: true,
        }
    }

    fn state_dir(&self) -> Option<&Path> {
        if self.states {
            self.dir.as_deref()
        } else {
            None
        }
    }
}

/// File name for one kind of per-run dump at `bound`, e.g. `concretes-03.txt`.
pub fn run_file_name(kind: &str, bound: usize) -> String {
    format!("{kind}-{bound:02}.txt")
}

/// File name of the `index`-th competitor found during predecessor search.
pub fn competitor_file_name(index: usize) -> String {
    format!("bp{index}.txt")
}

/// Open per-run dump files. Every writer is `None` when dumping is off.
pub(crate) struct RunDumps {
    concretes: Option<BufWriter<File>>,
    abstracts: Option<BufWriter<File>>,
    abstract_successors: Option<BufWriter<File>>,
}

impl RunDumps {
    pub(crate) fn open(config: &DumpConfig, bound: usize) -> io::Result<Self> {
        let Some(dir) = config.state_dir() else {
            return Ok(Self::disabled());
        };
        std::fs::create_dir_all(dir)?;
        let open = |kind: &str| -> io::Result<Option<BufWriter<File>>> {
            let file = File::create(dir.join(run_file_name(kind, bound)))?;
            Ok(Some(BufWriter::new(file)))
        };
        Ok(Self {
            concretes: open("concretes")?,
            abstracts: open("abstracts")?,
            abstract_successors: open("abstract_succs")?,
        })
    }

    pub(crate) fn disabled() -> Self {
        Self {
            concretes: None,
            abstracts: None,
            abstract_successors: None,
        }
    }

    pub(crate) fn concrete(&mut self, state: &impl Display) -> io::Result<()> {
        write_record(self.concretes.as_mut(), state)
    }

    pub(crate) fn abstraction(&mut self, state: &impl Display) -> io::Result<()> {
        write_record(self.abstracts.as_mut(), state)
    }

    pub(crate) fn successor_sink(&mut self) -> Option<&mut dyn Write> {
        self.abstract_successors
            .as_mut()
            .map(|w| w as &mut dyn Write)
    }

    pub(crate) fn finish(self) -> io::Result<()> {
        for mut writer in [self.concretes, self.abstracts, self.abstract_successors]
            .into_iter()
            .flatten()
        {
            writer.flush()?;
        }
        Ok(())
    }
}

fn write_record(out: Option<&mut BufWriter<File>>, state: &impl Display) -> io::Result<()> {
    if let Some(out) = out {
        write!(out, "{}", state)?;
        writeln!(out, "{}", SEPARATOR)?;
    }
    Ok(())
}

/// Write one competitor abstract state to `dir`, returning the file path.
pub(crate) fn write_competitor(
    dir: &Path,
    index: usize,
    state: &impl Display,
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(competitor_file_name(index));
    let mut out = BufWriter::new(File::create(&path)?);
    writeln!(out, "{}", state)?;
    out.flush()?;
    Ok(path)
}

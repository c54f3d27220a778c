//! Sparse text format for training problems
//!
//! One example per line:
//!
//! ```text
//! label index:value index:value ...
//! ```
//!
//! Indices are 1-based and strictly increasing. Index 0 only appears in
//! precomputed-kernel data, where it carries the example id.
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1

use crate::core::{Problem, Result, SVMError, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A training problem read from the sparse text format
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    problem: Problem,
}

impl LibSVMDataset {
    /// Load a dataset from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a dataset from a reader; blank lines and `#` comments are skipped
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut problem = Problem::default();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (features, label) = parse_line(line).map_err(|e| {
                SVMError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            problem.push(features, label);
        }

        if problem.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        Ok(Self { problem })
    }

    pub fn len(&self) -> usize {
        self.problem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problem.is_empty()
    }

    /// Largest attribute index in the data
    pub fn max_index(&self) -> usize {
        self.problem.max_index()
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn into_problem(self) -> Problem {
        self.problem
    }
}

impl From<LibSVMDataset> for Problem {
    fn from(dataset: LibSVMDataset) -> Self {
        dataset.problem
    }
}

/// Parse one line into its feature vector and label
pub fn parse_line(line: &str) -> std::result::Result<(SparseVector, f64), String> {
    let mut parts = line.split_whitespace();

    let label_str = parts.next().ok_or_else(|| "empty line".to_string())?;
    let label = label_str
        .parse::<f64>()
        .map_err(|_| format!("invalid label: {label_str}"))?;

    let mut pairs = Vec::new();
    for feature in parts {
        let (index, value) = feature
            .split_once(':')
            .ok_or_else(|| format!("invalid feature format: {feature}"))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| format!("invalid feature index: {index}"))?;
        let value = value
            .parse::<f64>()
            .map_err(|_| format!("invalid feature value: {value}"))?;
        pairs.push((index, value));
    }

    let features = SparseVector::try_from_pairs(pairs).map_err(|e| e.to_string())?;
    Ok((features, label))
}

/// Write a problem in the sparse text format
pub fn write_problem<W: Write>(problem: &Problem, writer: &mut W) -> Result<()> {
    for (x, y) in problem.vectors().iter().zip(problem.labels()) {
        write!(writer, "{y}")?;
        for (index, value) in x.iter() {
            write!(writer, " {index}:{value}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Save a problem to `path` in the sparse text format
pub fn save_problem<P: AsRef<Path>>(problem: &Problem, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_problem(problem, &mut writer)?;
    writer.flush()?;
    Ok(())
}

//! Model files
//!
//! Models are stored in the plain-text libsvm layout: a header of
//! `key value...` lines, the line `SV`, then one line per support vector
//! holding its `nr_class - 1` coefficients followed by `index:value` pairs.

use crate::core::{KernelType, Parameters, Result, SVMError, SparseVector, SvmType};
use crate::model::Model;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Save a model to `path`
pub fn save<P: AsRef<Path>>(model: &Model, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_model(model, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load a model from `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
    let file = File::open(path)?;
    read_model(BufReader::new(file))
}

fn write_list<W: Write, T: Display>(writer: &mut W, key: &str, values: &[T]) -> Result<()> {
    write!(writer, "{key}")?;
    for v in values {
        write!(writer, " {v}")?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Shortest text that reads back to the same `f64`
fn float(value: f64) -> String {
    format!("{value:?}")
}

fn floats(values: &[f64]) -> Vec<String> {
    values.iter().map(|&v| float(v)).collect()
}

/// Write a model in the text layout
pub fn write_model<W: Write>(model: &Model, writer: &mut W) -> Result<()> {
    let param = &model.param;
    let kernel_type = param.kernel_type;

    writeln!(writer, "svm_type {}", param.svm_type)?;
    writeln!(writer, "kernel_type {kernel_type}")?;
    if kernel_type.uses_degree() {
        writeln!(writer, "degree {}", param.degree)?;
    }
    if kernel_type.uses_gamma() {
        writeln!(writer, "gamma {}", float(param.gamma))?;
    }
    if kernel_type.uses_coef0() {
        writeln!(writer, "coef0 {}", float(param.coef0))?;
    }

    writeln!(writer, "nr_class {}", model.nr_class)?;
    writeln!(writer, "total_sv {}", model.support_vectors.len())?;
    write_list(writer, "rho", &floats(&model.rho))?;
    if let Some(labels) = &model.labels {
        write_list(writer, "label", labels)?;
    }
    if let Some(prob_a) = &model.prob_a {
        write_list(writer, "probA", &floats(prob_a))?;
    }
    if let Some(prob_b) = &model.prob_b {
        write_list(writer, "probB", &floats(prob_b))?;
    }
    if let Some(n_sv) = &model.n_sv {
        write_list(writer, "nr_sv", n_sv)?;
    }

    writeln!(writer, "SV")?;
    for (i, sv) in model.support_vectors.iter().enumerate() {
        for coef in &model.sv_coef {
            write!(writer, "{} ", float(coef[i]))?;
        }
        if kernel_type == KernelType::Precomputed {
            let id = sv.values.first().copied().unwrap_or(0.0);
            write!(writer, "0:{}", id as i64)?;
        } else {
            for (index, value) in sv.iter() {
                write!(writer, "{index}:{} ", float(value))?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn parse<T: FromStr>(line: usize, token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| SVMError::model_file(line, format!("invalid {what} '{token}'")))
}

/// Parse exactly `n` values of one header line
fn parse_list<T: FromStr>(line: usize, key: &str, rest: &str, n: usize) -> Result<Vec<T>> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() != n {
        return Err(SVMError::model_file(
            line,
            format!("{key} needs {n} values, found {}", tokens.len()),
        ));
    }
    tokens.iter().map(|t| parse(line, t, key)).collect()
}

/// Number of class pairs, or an error if it does not fit in `usize`
fn pair_count(line: usize, nr_class: usize) -> Result<usize> {
    nr_class
        .checked_mul(nr_class.saturating_sub(1))
        .map(|n| n / 2)
        .ok_or_else(|| SVMError::model_file(line, format!("nr_class {nr_class} is too large")))
}

/// Read a model in the text layout
///
/// Header counts are checked against each other before any support vector
/// is read; nothing is allocated from a count alone.
pub fn read_model<R: BufRead>(reader: R) -> Result<Model> {
    let mut lines = reader.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut param = Parameters::default();
    let mut svm_type: Option<SvmType> = None;
    let mut kernel_type: Option<KernelType> = None;
    let mut nr_class: Option<usize> = None;
    let mut total_sv: Option<usize> = None;
    let mut rho = None;
    let mut labels = None;
    let mut prob_a = None;
    let mut prob_b = None;
    let mut n_sv = None;
    let mut header_end = 0;

    let require_classes = |line: usize, nr_class: Option<usize>, key: &str| {
        nr_class.ok_or_else(|| SVMError::model_file(line, format!("{key} before nr_class")))
    };

    loop {
        let Some((number, text)) = lines.next() else {
            return Err(SVMError::model_file(header_end + 1, "missing SV section"));
        };
        let text = text?;
        header_end = number;
        let text = text.trim();
        let (key, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));

        match key {
            "svm_type" => {
                svm_type = Some(
                    SvmType::from_str(rest.trim())
                        .map_err(|_| SVMError::model_file(number, "unknown svm type"))?,
                )
            }
            "kernel_type" => {
                kernel_type = Some(
                    KernelType::from_str(rest.trim())
                        .map_err(|_| SVMError::model_file(number, "unknown kernel function"))?,
                )
            }
            "degree" => param.degree = parse(number, rest.trim(), "degree")?,
            "gamma" => param.gamma = parse(number, rest.trim(), "gamma")?,
            "coef0" => param.coef0 = parse(number, rest.trim(), "coef0")?,
            "nr_class" => nr_class = Some(parse(number, rest.trim(), "nr_class")?),
            "total_sv" => total_sv = Some(parse(number, rest.trim(), "total_sv")?),
            "rho" => {
                let k = require_classes(number, nr_class, key)?;
                rho = Some(parse_list::<f64>(number, key, rest, pair_count(number, k)?)?);
            }
            "label" => {
                let k = require_classes(number, nr_class, key)?;
                labels = Some(parse_list::<i32>(number, key, rest, k)?);
            }
            "probA" => {
                let k = require_classes(number, nr_class, key)?;
                let svm_type = svm_type
                    .ok_or_else(|| SVMError::model_file(number, "probA before svm_type"))?;
                let n = if svm_type.is_regression() { 1 } else { pair_count(number, k)? };
                prob_a = Some(parse_list::<f64>(number, key, rest, n)?);
            }
            "probB" => {
                let k = require_classes(number, nr_class, key)?;
                prob_b = Some(parse_list::<f64>(number, key, rest, pair_count(number, k)?)?);
            }
            "nr_sv" => {
                let k = require_classes(number, nr_class, key)?;
                n_sv = Some(parse_list::<usize>(number, key, rest, k)?);
            }
            "SV" => break,
            _ => return Err(SVMError::model_file(number, format!("unknown text '{key}'"))),
        }
    }

    let missing = |what: &str| SVMError::model_file(header_end, format!("missing {what}"));
    param.svm_type = svm_type.ok_or_else(|| missing("svm_type"))?;
    param.kernel_type = kernel_type.ok_or_else(|| missing("kernel_type"))?;
    let nr_class = nr_class.ok_or_else(|| missing("nr_class"))?;
    let total_sv = total_sv.ok_or_else(|| missing("total_sv"))?;
    let rho = rho.ok_or_else(|| missing("rho"))?;

    if param.svm_type.is_classification() {
        if nr_class == 0 {
            return Err(SVMError::model_file(header_end, "nr_class must be at least 1"));
        }
        let label_count = labels.as_ref().map(Vec::len).ok_or_else(|| missing("label"))?;
        let counts = n_sv.as_ref().ok_or_else(|| missing("nr_sv"))?;
        if label_count != nr_class || counts.len() != nr_class {
            return Err(SVMError::model_file(
                header_end,
                format!("label and nr_sv need {nr_class} values each"),
            ));
        }
        let sum = counts
            .iter()
            .try_fold(0usize, |acc, &c| acc.checked_add(c))
            .ok_or_else(|| SVMError::model_file(header_end, "nr_sv overflows"))?;
        if sum != total_sv {
            return Err(SVMError::model_file(
                header_end,
                format!("nr_sv adds up to {sum}, total_sv is {total_sv}"),
            ));
        }
    } else if nr_class != 2 {
        return Err(SVMError::model_file(
            header_end,
            format!("nr_class must be 2 for {} models", param.svm_type),
        ));
    }

    let mut sv_coef = vec![Vec::new(); nr_class - 1];
    let mut support_vectors = Vec::new();
    while support_vectors.len() < total_sv {
        let Some((number, text)) = lines.next() else {
            return Err(SVMError::model_file(
                header_end + support_vectors.len() + 1,
                format!("expected {total_sv} support vectors, found {}", support_vectors.len()),
            ));
        };
        let text = text?;
        let mut tokens = text
            .split(|c: char| c.is_whitespace() || c == ':')
            .filter(|t| !t.is_empty());

        for row in sv_coef.iter_mut() {
            let token = tokens
                .next()
                .ok_or_else(|| SVMError::model_file(number, "missing coefficient"))?;
            row.push(parse::<f64>(number, token, "coefficient")?);
        }

        let rest: Vec<&str> = tokens.collect();
        if rest.len() % 2 != 0 {
            return Err(SVMError::model_file(number, "incomplete index:value pair"));
        }
        let pairs = rest
            .chunks(2)
            .map(|pair| {
                Ok((
                    parse::<usize>(number, pair[0], "index")?,
                    parse::<f64>(number, pair[1], "value")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let sv = SparseVector::try_from_pairs(pairs)
            .map_err(|e| SVMError::model_file(number, e.to_string()))?;
        support_vectors.push(sv);
    }

    param.probability = prob_a.is_some();
    let model = Model {
        param,
        nr_class,
        support_vectors,
        sv_coef,
        rho,
        prob_a,
        prob_b,
        labels,
        n_sv,
    };
    model
        .check_layout()
        .map_err(|message| SVMError::model_file(header_end, message))?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn binary_model() -> Model {
        Model {
            param: Parameters::new()
                .with_kernel_type(KernelType::Rbf)
                .with_gamma(0.5),
            nr_class: 2,
            support_vectors: vec![
                SparseVector::new(vec![1, 3], vec![0.25, -1.0]),
                SparseVector::new(vec![2], vec![1e-7]),
            ],
            sv_coef: vec![vec![1.0, -1.0]],
            rho: vec![0.125],
            prob_a: Some(vec![-1.5]),
            prob_b: Some(vec![0.01]),
            labels: Some(vec![1, -1]),
            n_sv: Some(vec![1, 1]),
        }
    }

    fn to_text(model: &Model) -> String {
        let mut out = Vec::new();
        write_model(model, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_exact_layout() {
        let text = to_text(&binary_model());
        let expected = "svm_type c_svc\n\
                        kernel_type rbf\n\
                        gamma 0.5\n\
                        nr_class 2\n\
                        total_sv 2\n\
                        rho 0.125\n\
                        label 1 -1\n\
                        probA -1.5\n\
                        probB 0.01\n\
                        nr_sv 1 1\n\
                        SV\n\
                        1.0 1:0.25 3:-1.0 \n\
                        -1.0 2:1e-7 \n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_read_back() {
        let model = binary_model();
        let loaded = read_model(Cursor::new(to_text(&model))).unwrap();
        assert_eq!(loaded.support_vectors, model.support_vectors);
        assert_eq!(loaded.sv_coef, model.sv_coef);
        assert_eq!(loaded.rho, model.rho);
        assert_eq!(loaded.labels, model.labels);
        assert_eq!(loaded.prob_a, model.prob_a);
        assert_eq!(loaded.prob_b, model.prob_b);
        assert_eq!(loaded.n_sv, model.n_sv);
        assert_eq!(loaded.param.gamma, 0.5);
        assert!(loaded.param.probability);

        // Writing again reproduces the same text
        assert_eq!(to_text(&loaded), to_text(&model));
    }

    #[test]
    fn test_save_and_load_file() {
        let model = binary_model();
        let file = NamedTempFile::new().unwrap();
        save(&model, file.path()).unwrap();
        let loaded = load(file.path()).unwrap();
        assert_eq!(loaded.total_sv(), 2);
        let x = SparseVector::from_dense(&[0.2, 0.1, -0.9]);
        assert_eq!(loaded.predict_values(&x), model.predict_values(&x));
    }

    #[test]
    fn test_accepts_java_style_floats() {
        let text = "svm_type epsilon_svr\nkernel_type linear\nnr_class 2\ntotal_sv 1\nrho 1.0E-3\nprobA 0.5\nSV\n2.5E0 1:1.0E-1\n";
        let model = read_model(Cursor::new(text)).unwrap();
        assert_eq!(model.rho, vec![1e-3]);
        assert_eq!(model.sv_coef, vec![vec![2.5]]);
        assert_eq!(model.svr_probability(), Some(0.5));
        assert!(model.labels.is_none());
    }

    #[test]
    fn test_precomputed_rows() {
        let mut model = binary_model();
        model.param.kernel_type = KernelType::Precomputed;
        model.support_vectors = vec![
            SparseVector::new(vec![0, 1, 2], vec![1.0, 4.0, 2.0]),
            SparseVector::new(vec![0, 1, 2], vec![2.0, 2.0, 9.0]),
        ];
        let text = to_text(&model);
        assert!(text.ends_with("SV\n1.0 0:1\n-1.0 0:2\n"));
        assert!(!text.contains("gamma"));

        let loaded = read_model(Cursor::new(text)).unwrap();
        assert_eq!(loaded.support_vectors[1], SparseVector::new(vec![0], vec![2.0]));
        let x = SparseVector::new(vec![0, 1, 2], vec![0.0, 3.0, 5.0]);
        assert_eq!(loaded.predict_values(&x), model.predict_values(&x));
    }

    fn error_line(text: &str) -> usize {
        match read_model(Cursor::new(text)) {
            Err(SVMError::ModelFile { line, .. }) => line,
            other => panic!("expected a model file error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_files() {
        assert_eq!(error_line("svm_type c_svc\nfoo 1\n"), 2);
        assert_eq!(error_line("svm_type bogus\n"), 1);
        assert_eq!(error_line("svm_type c_svc\nkernel_type linear\nnr_class 2\n"), 4);
        assert_eq!(error_line("nr_class 2\ntotal_sv 1\nrho x\nSV\n"), 3);
        assert_eq!(error_line("nr_class 3\ntotal_sv 0\nrho 1 2\nSV\n"), 3);
        assert_eq!(error_line("rho 1\n"), 1);
        // Truncated support vector section
        assert_eq!(
            error_line("svm_type epsilon_svr\nkernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\nSV\n1 1:1\n"),
            8
        );
        assert_eq!(
            error_line("svm_type epsilon_svr\nkernel_type linear\nnr_class 2\ntotal_sv 1\nrho 0\nSV\n1 1:1 2\n"),
            7
        );
    }

    fn error_message(text: &str) -> String {
        match read_model(Cursor::new(text)) {
            Err(SVMError::ModelFile { message, .. }) => message,
            other => panic!("expected a model file error, got {other:?}"),
        }
    }

    const SVS: &str = "SV\n1 1:1 \n-1 1:-1 \n";

    #[test]
    fn test_classification_header_requires_label_and_nr_sv() {
        let without_nr_sv = format!(
            "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\nlabel 1 -1\n{SVS}"
        );
        assert_eq!(error_message(&without_nr_sv), "missing nr_sv");

        let without_label = format!(
            "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\nnr_sv 1 1\n{SVS}"
        );
        assert_eq!(error_message(&without_label), "missing label");

        let complete = format!(
            "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\nlabel 1 -1\nnr_sv 1 1\n{SVS}"
        );
        let model = read_model(Cursor::new(complete)).unwrap();
        assert_eq!(model.predict(&SparseVector::from_dense(&[2.0])), 1.0);
        assert_eq!(model.predict(&SparseVector::from_dense(&[-2.0])), -1.0);
    }

    #[test]
    fn test_header_requires_svm_and_kernel_type() {
        let text = format!("kernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\n{SVS}");
        assert_eq!(error_message(&text), "missing svm_type");
        let text = format!("svm_type epsilon_svr\nnr_class 2\ntotal_sv 2\nrho 0\n{SVS}");
        assert_eq!(error_message(&text), "missing kernel_type");
        let text = "nr_class 2\nprobA 0.5\n";
        assert_eq!(error_message(text), "probA before svm_type");
    }

    #[test]
    fn test_inconsistent_class_tables() {
        let header = "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\n";
        let text = format!("{header}label 1 -1\nnr_sv 1 2\n{SVS}");
        assert_eq!(error_message(&text), "nr_sv adds up to 3, total_sv is 2");

        let text = format!("{header}label 1 -1 3\nnr_sv 1 1\n{SVS}");
        assert_eq!(error_line(&text), 6);

        // nr_class changed after the class tables were read
        let text = format!("{header}label 1 -1\nnr_class 3\nnr_sv 1 1 0\n{SVS}");
        assert_eq!(error_message(&text), "label and nr_sv need 3 values each");

        let text = "svm_type one_class\nkernel_type linear\nnr_class 3\ntotal_sv 0\nrho 1 2 3\nSV\n";
        assert_eq!(error_message(text), "nr_class must be 2 for one_class models");
    }

    #[test]
    fn test_huge_counts_are_errors() {
        // No allocation may be sized by the header alone
        let text = "svm_type epsilon_svr\nkernel_type linear\nnr_class 2\ntotal_sv 100000000000000\nrho 0\nSV\n1 1:1\n";
        assert!(error_message(text).starts_with("expected 100000000000000 support vectors, found 1"));

        let text = "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 100000000000000\n\
                    rho 0\nlabel 1 -1\nnr_sv 50000000000000 50000000000000\nSV\n1 1:1\n";
        assert!(error_message(text).starts_with("expected 100000000000000 support vectors"));

        let text = format!(
            "svm_type c_svc\nkernel_type linear\nnr_class {}\ntotal_sv 0\nrho 0\nSV\n",
            usize::MAX
        );
        assert_eq!(error_line(&text), 5);
        assert!(error_message(&text).ends_with("is too large"));

        let text = format!(
            "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 0\nrho 0\n\
             label 1 -1\nnr_sv {} 1\nSV\n",
            usize::MAX
        );
        assert_eq!(error_message(&text), "nr_sv overflows");
    }

    #[test]
    fn test_layout_check_catches_mismatched_tables() {
        assert_eq!(binary_model().check_layout(), Ok(()));

        let mut model = binary_model();
        model.n_sv = Some(vec![2, 1]);
        assert!(model.check_layout().is_err());

        let mut model = binary_model();
        model.labels = None;
        assert!(model.check_layout().is_err());

        let mut model = binary_model();
        model.sv_coef[0].pop();
        assert!(model.check_layout().is_err());

        let mut model = binary_model();
        model.prob_b = Some(vec![0.1, 0.2]);
        assert!(model.check_layout().is_err());
    }
}

//! Dataset compatibility and format validation tests
//!
//! Data files in the sparse text format should flow through loading,
//! training, saving and reloading without surprises.

use smosvm::api::{self, SVM};
use smosvm::data::{parse_line, write_problem};
use smosvm::{KernelType, LibSVMDataset, Parameters, Problem, SVMError, SparseVector, SvmType};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn dataset(text: &str) -> LibSVMDataset {
    LibSVMDataset::from_reader(Cursor::new(text)).unwrap()
}

/// Test format variations of the sparse text format
#[test]
fn test_libsvm_format_variations() {
    let test_cases = vec![
        ("+1 1:0.5 3:1.2 7:0.8\n-1 2:0.3 5:2.1\n", "basic format"),
        (
            "# This is a comment\n+1 1:0.5 3:1.2\n\n# Another comment\n-1 2:0.3\n",
            "with comments",
        ),
        ("1 1:0.5 2:1.0\n-1 1:-0.5 2:-1.0\n", "unsigned labels"),
        (
            "+1 1:1.0 10:2.0 100:3.0\n-1 5:1.5 50:2.5 500:3.5\n",
            "sparse indices",
        ),
        ("+1 1:2.0\n-1 1:-2.0\n+1 1:1.8\n-1 1:-1.8\n", "single feature"),
        ("+1\t1:1.0   2:2.0\n-1 1:-1.0\t2:-2.0  \n", "mixed whitespace"),
        ("+1 1:1e-1 2:2E+0\n-1 1:-1.5e0 2:-.5\n", "exponent notation"),
    ];

    for (data, description) in test_cases {
        let dataset = LibSVMDataset::from_reader(Cursor::new(data))
            .unwrap_or_else(|e| panic!("{description}: {e}"));
        assert!(dataset.len() >= 2, "{description}");

        let model = SVM::new()
            .with_kernel(KernelType::Linear)
            .train(dataset.problem())
            .unwrap_or_else(|e| panic!("{description}: {e}"));
        assert_eq!(model.nr_class(), 2, "{description}");
        assert_eq!(
            api::evaluate(&model, dataset.problem()),
            1.0,
            "{description}"
        );
    }
}

#[test]
fn test_multiclass_labels_keep_first_appearance_order() {
    let data = "\
3 1:0.0 2:3.0
1 1:3.0 2:0.0
2 1:-3.0 2:-3.0
3 1:0.2 2:3.1
1 1:3.1 2:0.2
2 1:-3.1 2:-2.8
";
    let dataset = dataset(data);
    let model = SVM::new()
        .with_kernel(KernelType::Linear)
        .train(dataset.problem())
        .unwrap();

    assert_eq!(model.labels(), Some(&[3, 1, 2][..]));
    assert_eq!(model.nr_class(), 3);
    assert_eq!(model.rho().len(), 3);
    assert_eq!(model.sv_coef().len(), 2);
    assert_eq!(api::evaluate(&model, dataset.problem()), 1.0);
}

#[test]
fn test_regression_targets_are_real_valued() {
    let mut text = String::new();
    for i in 0..15 {
        let x = i as f64 * 0.2;
        text.push_str(&format!("{} 1:{x}\n", 0.5 - 1.5 * x));
    }
    let dataset = dataset(&text);
    assert_eq!(dataset.problem().label(3), 0.5 - 1.5 * (3.0 * 0.2));

    let model = SVM::new()
        .with_svm_type(SvmType::EpsilonSvr)
        .with_kernel(KernelType::Linear)
        .with_c(10.0)
        .train(dataset.problem())
        .unwrap();
    assert_eq!(model.nr_class(), 2);
    assert!(model.labels().is_none());
    let prediction = api::predict(&model, &SparseVector::from_dense(&[1.0]));
    assert!((prediction + 1.0).abs() < 0.2, "prediction {prediction}");
}

#[test]
fn test_precomputed_kernel_data() {
    // Linear kernel matrix of the points 2, -2, 1.5, -1.5
    let points: [f64; 4] = [2.0, -2.0, 1.5, -1.5];
    let mut text = String::new();
    for (i, &xi) in points.iter().enumerate() {
        text.push_str(&format!("{} 0:{}", xi.signum(), i + 1));
        for (j, &xj) in points.iter().enumerate() {
            text.push_str(&format!(" {}:{}", j + 1, xi * xj));
        }
        text.push('\n');
    }
    let dataset = dataset(&text);
    assert_eq!(dataset.problem().vector(2).get(0), 3.0);

    let params = Parameters::new().with_kernel_type(KernelType::Precomputed);
    let model = api::train(dataset.problem(), &params).unwrap();
    assert_eq!(api::evaluate(&model, dataset.problem()), 1.0);

    let file = NamedTempFile::new().unwrap();
    api::save(&model, file.path()).unwrap();
    let text = std::fs::read_to_string(file.path()).unwrap();
    let sv_lines: Vec<&str> = text
        .lines()
        .skip_while(|line| *line != "SV")
        .skip(1)
        .collect();
    assert_eq!(sv_lines.len(), model.total_sv());
    for line in sv_lines {
        let last = line.split(' ').last().unwrap();
        assert!(last.starts_with("0:"), "precomputed SV line '{line}'");
    }

    let loaded = api::load(file.path()).unwrap();
    for x in dataset.problem().vectors() {
        assert_eq!(api::predict_values(&loaded, x), api::predict_values(&model, x));
    }
}

#[test]
fn test_large_dimensions() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "+1 1:1.0 1000:2.0 50000:3.0").unwrap();
    writeln!(temp_file, "-1 2:1.0 1000:-2.0 60000:-1.0").unwrap();
    writeln!(temp_file, "+1 3:0.5 1000:1.5 50000:2.0").unwrap();
    writeln!(temp_file, "-1 4:0.2 1000:-1.8 60000:-0.5").unwrap();
    temp_file.flush().unwrap();

    let dataset = LibSVMDataset::from_file(temp_file.path()).unwrap();
    assert_eq!(dataset.max_index(), 60000);

    // Default gamma resolves to 1 / max_index
    let svm = SVM::new();
    let model = svm.train(dataset.problem()).unwrap();
    assert_eq!(model.params().gamma, 1.0 / 60000.0);

    let model = SVM::new()
        .with_kernel(KernelType::Linear)
        .train(dataset.problem())
        .unwrap();
    assert_eq!(api::evaluate(&model, dataset.problem()), 1.0);
}

#[test]
fn test_malformed_data_handling() {
    let malformed_cases = vec![
        ("+1 1:0.5 invalid\n", "feature without colon"),
        ("+1 abc:0.5\n", "non-numeric index"),
        ("+1 1:xyz\n", "non-numeric value"),
        ("label 1:0.5\n", "non-numeric label"),
        ("+1 -3:0.5\n", "negative index"),
        ("+1 4:0.5 2:0.1\n", "decreasing indices"),
        ("+1 2:0.5 2:0.1\n", "duplicate indices"),
        ("# nothing but comments\n\n", "no examples"),
    ];

    for (data, description) in malformed_cases {
        let result = LibSVMDataset::from_reader(Cursor::new(data));
        match result {
            Err(SVMError::ParseError(_)) | Err(SVMError::EmptyDataset) => {}
            other => panic!("{description}: expected an error, got {other:?}"),
        }
    }
}

#[test]
fn test_parse_errors_name_the_line() {
    let data = "+1 1:0.5\n# comment\n-1 1:0.5\n+1 1:oops\n";
    match LibSVMDataset::from_reader(Cursor::new(data)) {
        Err(SVMError::ParseError(message)) => {
            assert!(message.contains("line 4"), "{message}");
            assert!(message.contains("oops"), "{message}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_written_problem_loads_identically() {
    let mut problem = Problem::default();
    problem.push(SparseVector::new(vec![1, 7], vec![0.125, -3.5]), 1.0);
    problem.push(SparseVector::empty(), -1.0);
    problem.push(SparseVector::new(vec![2], vec![1e-12]), 4.25);

    let mut out = Vec::new();
    write_problem(&problem, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let reloaded = dataset(&text);
    assert_eq!(reloaded.problem().labels(), problem.labels());
    assert_eq!(reloaded.problem().vectors(), problem.vectors());

    for line in text.lines() {
        assert!(parse_line(line).is_ok(), "line '{line}'");
    }
}

#[test]
fn test_dataset_conversion() {
    let dataset = dataset("+1 1:1\n-1 2:1\n");
    let problem: Problem = dataset.clone().into();
    assert_eq!(problem.len(), 2);
    assert_eq!(dataset.into_problem(), problem);
}

//! Training parameters
//!
//! A [`Parameters`] value is fixed for one training run. It can be built with
//! the `with_*` methods, parsed from a libsvm-style option string such as
//! `-s 0 -t 2 -c 10 -w1 2.5`, or read from a JSON file.

use crate::core::types::ClassGroups;
use crate::core::{Problem, Result, SVMError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmType {
    CSvc,
    NuSvc,
    OneClass,
    EpsilonSvr,
    NuSvr,
}

impl SvmType {
    const ALL: [SvmType; 5] = [
        SvmType::CSvc,
        SvmType::NuSvc,
        SvmType::OneClass,
        SvmType::EpsilonSvr,
        SvmType::NuSvr,
    ];

    /// Name used in model files
    pub fn as_str(&self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }

    /// Map the numeric code of the `-s` option
    pub fn from_code(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| SVMError::InvalidParameter("unknown svm type".to_string()))
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    pub fn is_regression(&self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SvmType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SVMError::InvalidParameter("unknown svm type".to_string()))
    }
}

/// Kernel function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Precomputed,
}

impl KernelType {
    const ALL: [KernelType; 5] = [
        KernelType::Linear,
        KernelType::Polynomial,
        KernelType::Rbf,
        KernelType::Sigmoid,
        KernelType::Precomputed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Precomputed => "precomputed",
        }
    }

    /// Map the numeric code of the `-t` option
    pub fn from_code(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| SVMError::InvalidParameter("unknown kernel type".to_string()))
    }

    pub fn uses_degree(&self) -> bool {
        matches!(self, KernelType::Polynomial)
    }

    pub fn uses_gamma(&self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }

    pub fn uses_coef0(&self) -> bool {
        matches!(self, KernelType::Polynomial | KernelType::Sigmoid)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SVMError::InvalidParameter("unknown kernel type".to_string()))
    }
}

/// Multiplier applied to C for one class label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeight {
    pub label: i32,
    pub weight: f64,
}

/// Configuration of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    /// Kernel width; 0 means 1/max_index once a problem is known
    pub gamma: f64,
    pub coef0: f64,
    /// Kernel cache size in megabytes
    pub cache_size: f64,
    /// Regularization parameter for C-SVC, ε-SVR and ν-SVR
    pub c: f64,
    /// Stopping tolerance
    pub eps: f64,
    /// ν for ν-SVC, one-class and ν-SVR
    pub nu: f64,
    /// Width of the ε-insensitive tube for ε-SVR
    pub p: f64,
    pub shrinking: bool,
    /// Fit probability estimates during training
    pub probability: bool,
    /// Per-class multipliers of C
    pub weights: Vec<ClassWeight>,
    /// Seed of the generator used for fold shuffling
    pub random_seed: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cache_size: 100.0,
            c: 1.0,
            eps: 1e-3,
            nu: 0.5,
            p: 0.1,
            shrinking: true,
            probability: false,
            weights: Vec::new(),
            random_seed: 1,
        }
    }
}

/// Result of parsing an option string
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOptions {
    pub params: Parameters,
    /// Number of folds requested with `-v`
    pub cross_validation: Option<usize>,
}

fn parse_value<T: FromStr>(flag: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        SVMError::InvalidParameter(format!("invalid value '{value}' for option {flag}"))
    })
}

fn parse_switch(flag: &str, value: &str, message: &str) -> Result<bool> {
    match parse_value::<i32>(flag, value)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(SVMError::InvalidParameter(message.to_string())),
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.svm_type = svm_type;
        self
    }

    pub fn with_kernel_type(mut self, kernel_type: KernelType) -> Self {
        self.kernel_type = kernel_type;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.coef0 = coef0;
        self
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(mut self, cache_size: f64) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    pub fn with_p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.shrinking = shrinking;
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.probability = probability;
        self
    }

    /// Add a C multiplier for one class label
    pub fn with_weight(mut self, label: i32, weight: f64) -> Self {
        self.weights.push(ClassWeight { label, weight });
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Resolve `gamma = 0` to `1 / max_index` of the problem
    pub fn with_default_gamma(mut self, problem: &Problem) -> Self {
        let max_index = problem.max_index();
        if self.gamma == 0.0 && max_index > 0 {
            self.gamma = 1.0 / max_index as f64;
        }
        self
    }

    /// Parse a libsvm-style option string
    ///
    /// Parsing stops at the first token that is not a flag. Unknown flags are
    /// logged and their value is skipped.
    pub fn parse_options(options: &str) -> Result<ParsedOptions> {
        let mut params = Parameters::default();
        let mut cross_validation = None;
        let mut tokens = options.split_whitespace();

        while let Some(flag) = tokens.next() {
            if !flag.starts_with('-') || flag.len() < 2 {
                warn!("ignoring trailing options starting at '{flag}'");
                break;
            }
            let value = tokens.next().ok_or_else(|| {
                SVMError::InvalidParameter(format!("option {flag} requires a value"))
            })?;

            match flag {
                "-s" => params.svm_type = SvmType::from_code(parse_value(flag, value)?)?,
                "-t" => params.kernel_type = KernelType::from_code(parse_value(flag, value)?)?,
                "-d" => params.degree = parse_value(flag, value)?,
                "-g" => params.gamma = parse_value(flag, value)?,
                "-r" => params.coef0 = parse_value(flag, value)?,
                "-n" => params.nu = parse_value(flag, value)?,
                "-m" => params.cache_size = parse_value(flag, value)?,
                "-c" => params.c = parse_value(flag, value)?,
                "-e" => params.eps = parse_value(flag, value)?,
                "-p" => params.p = parse_value(flag, value)?,
                "-v" => cross_validation = Some(parse_value(flag, value)?),
                "-h" => {
                    params.shrinking =
                        parse_switch(flag, value, "shrinking != 0 and shrinking != 1")?
                }
                "-b" => {
                    params.probability =
                        parse_switch(flag, value, "probability != 0 and probability != 1")?
                }
                _ if flag.starts_with("-w") => {
                    let label = parse_value(flag, &flag[2..])?;
                    let weight = parse_value(flag, value)?;
                    params.weights.push(ClassWeight { label, weight });
                }
                _ => warn!("unknown option {flag}, skipping value '{value}'"),
            }
        }

        Ok(ParsedOptions {
            params,
            cross_validation,
        })
    }

    /// Load parameters from a JSON file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the parameters against a problem
    pub fn check(&self, problem: &Problem) -> Result<()> {
        self.check_labels(problem.labels())
    }

    pub(crate) fn check_labels(&self, labels: &[f64]) -> Result<()> {
        let fail = |message: &str| Err(SVMError::InvalidParameter(message.to_string()));
        let svm_type = self.svm_type;

        if self.gamma < 0.0 {
            return fail("gamma < 0");
        }
        if self.degree < 0 {
            return fail("degree of polynomial kernel < 0");
        }
        if self.cache_size <= 0.0 {
            return fail("cache_size <= 0");
        }
        if self.eps <= 0.0 {
            return fail("eps <= 0");
        }
        if matches!(
            svm_type,
            SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr
        ) && self.c <= 0.0
        {
            return fail("C <= 0");
        }
        if matches!(svm_type, SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr)
            && (self.nu <= 0.0 || self.nu > 1.0)
        {
            return fail("nu <= 0 or nu > 1");
        }
        if svm_type == SvmType::EpsilonSvr && self.p < 0.0 {
            return fail("p < 0");
        }
        if self.probability && svm_type == SvmType::OneClass {
            return fail("one-class SVM probability output not supported yet");
        }

        if svm_type == SvmType::NuSvc {
            let groups = ClassGroups::from_labels(labels);
            for (i, &n1) in groups.count.iter().enumerate() {
                for &n2 in &groups.count[i + 1..] {
                    if self.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                        return fail("specified nu is infeasible");
                    }
                }
            }
        }

        Ok(())
    }
}

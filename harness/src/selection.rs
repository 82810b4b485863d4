//! Which fixtures and stages a command operates on.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use fixtures::Module;
use serde::Serialize;

/// Ordered fixture numbers: an inclusive range, walked lazily, or an
/// explicit list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSelection {
    Range { first: u32, last: u32 },
    List(Vec<u32>),
}

impl TestSelection {
    /// Inclusive range `first..=last`; empty when `first > last`
    pub fn from_range(first: u32, last: u32) -> Self {
        Self::Range { first, last }
    }

    pub fn from_numbers(numbers: Vec<u32>) -> Self {
        Self::List(numbers)
    }

    /// Parse the positional test arguments.
    ///
    /// * no arguments: `default`
    /// * `a..b` as the first argument: fixtures `a` through `b` inclusive,
    ///   any further arguments are ignored
    /// * otherwise every argument is a fixture number, order kept
    pub fn parse(args: &[String], default: TestSelection) -> HarnessResult<Self> {
        let Some(first) = args.first() else {
            return Ok(default);
        };

        if let Some((start, end)) = first.split_once("..") {
            if args.len() > 1 {
                tracing::warn!("Ignoring {} arguments after range {}", args.len() - 1, first);
            }
            let start = parse_number(first, start)?;
            let end = parse_number(first, end)?;
            if start > end {
                return Err(HarnessError::InvalidSelection {
                    input: first.clone(),
                    reason: format!("range start {start} is after end {end}"),
                });
            }
            return Ok(Self::from_range(start, end));
        }

        args.iter()
            .map(|arg| parse_number(arg, arg))
            .collect::<HarnessResult<Vec<_>>>()
            .map(Self::List)
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Self::Range { first, last } => Box::new(*first..=*last),
            Self::List(numbers) => Box::new(numbers.iter().copied()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Range { first, last } if first <= last => (last - first) as usize + 1,
            Self::Range { .. } => 0,
            Self::List(numbers) => numbers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TestSelection {
    fn default() -> Self {
        Self::from_range(0, 10)
    }
}

fn parse_number(input: &str, token: &str) -> HarnessResult<u32> {
    token
        .trim()
        .parse()
        .map_err(|_| HarnessError::InvalidSelection {
            input: input.to_string(),
            reason: format!("'{}' is not a test number", token.trim()),
        })
}

/// Resolve a module argument: `all`, a single stage, or a comma list
pub fn parse_modules(arg: &str, config: &HarnessConfig) -> HarnessResult<Vec<Module>> {
    if arg == "all" {
        return Ok(config.modules.clone());
    }

    let mut modules = Vec::new();
    for name in arg.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let module = Module::new(name)?;
        if !modules.contains(&module) {
            modules.push(module);
        }
    }

    if modules.is_empty() {
        return Err(HarnessError::InvalidSelection {
            input: arg.to_string(),
            reason: "no module named".to_string(),
        });
    }
    Ok(modules)
}

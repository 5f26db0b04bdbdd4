use crate::{codes::CodeSystem, error::SetupError, ArcStr};

use qu::ick_use::*;
use std::{
    collections::{btree_set, BTreeMap, BTreeSet},
    fmt, fs, io, ops,
    path::Path,
    sync::Arc,
};

/// A set of clinical codes, all in one coding system.
///
/// Codes can optionally be grouped into categories (e.g. the 6 ethnicity groups), which is read
/// from a second column of the codelist file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codelist {
    system: CodeSystem,
    codes: Arc<BTreeSet<ArcStr>>,
    categories: Arc<BTreeMap<ArcStr, ArcStr>>,
}

impl Codelist {
    /// Build a codelist from a literal list of codes.
    ///
    /// Every code is checked against the lexical rules of `system`. Duplicates will be removed.
    pub fn from_codes(
        system: CodeSystem,
        codes: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self, SetupError> {
        let mut set = BTreeSet::new();
        for code in codes {
            let code = code.as_ref().trim();
            system.validate(code)?;
            set.insert(ArcStr::from(code));
        }
        Ok(Self {
            system,
            codes: Arc::new(set),
            categories: Arc::new(BTreeMap::new()),
        })
    }

    /// Load a codelist from a CSV file with a header row.
    ///
    /// `column` names the column holding the codes, and `category_column` the (optional) column
    /// holding each code's category. Column names vary between codelist files.
    pub fn from_csv(
        path: impl AsRef<Path>,
        system: CodeSystem,
        column: &str,
        category_column: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let inner = || -> Result<Self> {
            let reader = fs::File::open(path)?;
            Self::from_reader(reader, system, column, category_column)
        };
        inner().with_context(|| format!("loading codelist from file \"{}\"", path.display()))
    }

    /// Like `from_csv`, but from any reader.
    pub fn from_reader(
        reader: impl io::Read,
        system: CodeSystem,
        column: &str,
        category_column: Option<&str>,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| format_err!("codelist has no column named \"{}\"", name))
        };
        let code_idx = find(column)?;
        let category_idx = category_column.map(find).transpose()?;

        let mut codes = BTreeSet::new();
        let mut categories = BTreeMap::new();
        for record in reader.into_records() {
            let record = record?;
            let code = match record.get(code_idx) {
                Some(code) if !code.is_empty() => code,
                _ => continue,
            };
            system.validate(code)?;
            let code = ArcStr::from(code);
            if let Some(idx) = category_idx {
                let category: ArcStr = record.get(idx).unwrap_or("").into();
                if let Some(existing) = categories.get(&code) {
                    ensure!(
                        *existing == category,
                        "code \"{}\" is in categories \"{}\" and \"{}\"",
                        code,
                        existing,
                        category
                    );
                }
                categories.insert(code.clone(), category);
            }
            codes.insert(code);
        }

        Ok(Self {
            system,
            codes: Arc::new(codes),
            categories: Arc::new(categories),
        })
    }

    /// The union of this codelist with `others`.
    ///
    /// Use with caution: the coding system of the result is the system of `self`, and the
    /// systems of `others` are *not* checked against it. Where two lists put the same code in
    /// different categories, the first one wins.
    pub fn combine(&self, others: &[&Codelist]) -> Codelist {
        let mut out = self.clone();
        for other in others {
            let codes = Arc::make_mut(&mut out.codes);
            codes.extend(other.codes.iter().cloned());
            let categories = Arc::make_mut(&mut out.categories);
            for (code, category) in other.categories.iter() {
                categories
                    .entry(code.clone())
                    .or_insert_with(|| category.clone());
            }
        }
        out
    }

    pub fn system(&self) -> CodeSystem {
        self.system
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// The category of `code`, if the codelist has categories and the code is in it.
    pub fn category(&self, code: &str) -> Option<&ArcStr> {
        self.categories.get(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, ArcStr> {
        self.codes.iter()
    }
}

/// Addition for codelists is `combine`, so the same caution applies.
impl ops::Add<&Codelist> for Codelist {
    type Output = Codelist;
    fn add(self, rhs: &Codelist) -> Self::Output {
        self.combine(&[rhs])
    }
}

impl fmt::Display for Codelist {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {{", self.system)?;
        let mut codes = self.codes.iter();
        if let Some(code) = codes.next() {
            write!(f, "{}", code)?;
        }
        for code in codes {
            write!(f, ", {}", code)?;
        }
        write!(f, "}}")
    }
}

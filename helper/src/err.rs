use std::fmt;

/// Errors collected from independent operations that were all allowed to run
/// to completion.
#[derive(Debug, Default)]
pub struct IndividualErrorList {
    list: Vec<anyhow::Error>,
}

impl IndividualErrorList {
    pub fn push(&mut self, err: anyhow::Error) { self.list.push(err); }

    pub fn len(&self) -> usize { self.list.len() }

    pub fn is_empty(&self) -> bool { self.list.is_empty() }
}

impl fmt::Display for IndividualErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ii, err) in self.list.iter().enumerate() {
            if ii > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{:#}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for IndividualErrorList {}

impl From<Vec<anyhow::Error>> for IndividualErrorList {
    fn from(list: Vec<anyhow::Error>) -> Self { IndividualErrorList { list } }
}

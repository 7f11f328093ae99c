use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{field}` must not be blank")]
    BlankField { field: &'static str },
    #[error("`{field}` must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },
    #[error("course codes in `{field}` must not be blank")]
    BlankCode { field: &'static str },
}

impl DomainError {
    pub fn blank(field: &'static str) -> Self {
        Self::BlankField { field }
    }

    pub fn negative(field: &'static str, value: impl Into<i64>) -> Self {
        Self::Negative {
            field,
            value: value.into(),
        }
    }
}

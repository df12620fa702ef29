use thiserror::Error;

pub type DocmillResult<T> = Result<T, DocmillError>;

#[derive(Error, Debug)]
pub enum DocmillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Mapping file error: {0}")]
    Mapping(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Archive error: {0}")]
    Zip(String),
}

impl From<quick_xml::Error> for DocmillError {
    fn from(e: quick_xml::Error) -> Self {
        DocmillError::Xml(e.to_string())
    }
}

impl From<zip::result::ZipError> for DocmillError {
    fn from(e: zip::result::ZipError) -> Self {
        DocmillError::Zip(e.to_string())
    }
}

impl From<csv::Error> for DocmillError {
    fn from(e: csv::Error) -> Self {
        DocmillError::Io(std::io::Error::other(e.to_string()))
    }
}

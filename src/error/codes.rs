#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidArguments = 2,
    ConnectionError = 3,
    AuthenticationError = 4,
    ValidationError = 5,
    ConfigError = 6,
    CacheError = 7,
    SeasonalError = 8,
    IoError = 9,
    ClipboardError = 10,
    NoTitles = 11,
    PartialFailure = 12,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

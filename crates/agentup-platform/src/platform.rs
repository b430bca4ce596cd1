use std::fmt;
use std::str::FromStr;

/// Operating system identifier in the manifest vocabulary (`linux`, `darwin`,
/// `windows`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
    Other(String),
}

impl Os {
    #[must_use]
    pub fn current() -> Self {
        std::env::consts::OS
            .parse()
            .unwrap_or_else(|never: std::convert::Infallible| match never {})
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
            Os::Other(name) => name,
        }
    }

    /// Suffix carried by executables on this OS.
    #[must_use]
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            _ => "",
        }
    }
}

impl FromStr for Os {
    type Err = std::convert::Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lower = name.trim().to_ascii_lowercase();
        Ok(match lower.as_str() {
            "linux" => Os::Linux,
            "darwin" | "macos" => Os::Darwin,
            "windows" => Os::Windows,
            _ => Os::Other(lower),
        })
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture identifier in the manifest vocabulary (`amd64`, `arm64`,
/// `386`, `arm`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
    X86,
    Arm,
    Other(String),
}

impl Arch {
    #[must_use]
    pub fn current() -> Self {
        std::env::consts::ARCH
            .parse()
            .unwrap_or_else(|never: std::convert::Infallible| match never {})
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::X86 => "386",
            Arch::Arm => "arm",
            Arch::Other(name) => name,
        }
    }
}

impl FromStr for Arch {
    type Err = std::convert::Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lower = name.trim().to_ascii_lowercase();
        Ok(match lower.as_str() {
            "amd64" | "x86_64" | "x64" => Arch::Amd64,
            "arm64" | "aarch64" => Arch::Arm64,
            "386" | "x86" | "i686" => Arch::X86,
            "arm" => Arch::Arm,
            _ => Arch::Other(lower),
        })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform of the running process.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Os::current(), Arch::current())
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    #[must_use]
    pub fn exe_suffix(&self) -> &'static str {
        self.os.exe_suffix()
    }

    /// Case-insensitive match against manifest identifiers.
    #[must_use]
    pub fn matches(&self, os: &str, arch: &str) -> bool {
        os.eq_ignore_ascii_case(self.os.as_str()) && arch.eq_ignore_ascii_case(self.arch.as_str())
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

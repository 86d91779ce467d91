use std::path::PathBuf;

use calltrace_utils::TracePath;
use clap::Parser;
use eyre::{OptionExt, Result};

#[derive(Clone, Debug, Default, Parser)]
pub struct RegistryOpts {
    /// The calltrace home directory. If not provided, the default is `~/.calltrace`.
    #[clap(long, env = "CALLTRACE_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,
}

impl RegistryOpts {
    /// Path of the contract registry file.
    pub fn registry_file(&self) -> Result<PathBuf> {
        TracePath::new(self.home.clone())
            .contracts_file()
            .ok_or_eyre("could not determine the calltrace home directory")
    }
}

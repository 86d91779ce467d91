//! Bookkeeping for sessions that debug several contracts in one process.

use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use alloy_primitives::Address;
use calltrace_utils::{load_json, save_json};
use eyre::{OptionExt, Result, WrapErr};
use serde::{Deserialize, Serialize};

/// Label of the outermost, non-contract frame of the call stack.
const MAIN: &str = "main";

/// A contract library loaded in the debugger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: Address,
    pub library_path: PathBuf,
    /// Functions with a requested breakpoint.
    #[serde(default)]
    pub breakpoints: Vec<String>,
}

/// Registered contracts and the cross-contract call stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRegistry {
    /// Sorted by address.
    #[serde(default)]
    contracts: Vec<ContractInfo>,
    #[serde(default)]
    call_stack: Vec<Address>,
    #[serde(default)]
    current: Option<Address>,
}

impl ContractRegistry {
    /// Load the registry from `path`, or start empty if it does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(load_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self)
    }

    fn position(&self, address: &Address) -> Result<usize, usize> {
        self.contracts.binary_search_by(|info| info.address.cmp(address))
    }

    /// Register a contract. Registering an address again replaces its entry.
    pub fn add(&mut self, address: Address, library_path: impl Into<PathBuf>) -> &ContractInfo {
        let info = ContractInfo { address, library_path: library_path.into(), breakpoints: vec![] };
        let idx = match self.position(&address) {
            Ok(idx) => {
                self.contracts[idx] = info;
                idx
            }
            Err(idx) => {
                self.contracts.insert(idx, info);
                idx
            }
        };
        &self.contracts[idx]
    }

    pub fn get(&self, address: &Address) -> Option<&ContractInfo> {
        self.position(address).ok().map(|idx| &self.contracts[idx])
    }

    /// Request a breakpoint on `function` inside a registered contract.
    pub fn breakpoint(
        &mut self,
        address: Address,
        function: impl Into<String>,
    ) -> Result<&ContractInfo> {
        let idx = self.position(&address).ok().ok_or_eyre(format!(
            "contract {address} not found, add it first"
        ))?;
        let info = &mut self.contracts[idx];
        info.breakpoints.push(function.into());
        Ok(info)
    }

    /// Registered contracts in address order.
    pub fn list(&self) -> &[ContractInfo] {
        &self.contracts
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Enter a contract call.
    pub fn push_context(&mut self, address: Address) {
        self.call_stack.push(address);
        self.current = Some(address);
    }

    /// Leave the innermost contract call. Does nothing when the stack is empty.
    pub fn pop_context(&mut self) {
        if self.call_stack.pop().is_some() {
            self.current = self.call_stack.last().copied();
        }
    }

    /// Switch the current context to a registered contract.
    pub fn set_context(&mut self, address: Address) -> Result<&ContractInfo> {
        let idx = self.position(&address).ok().ok_or_eyre(format!(
            "contract {address} not found, add it first"
        ))?;
        self.current = Some(address);
        Ok(&self.contracts[idx])
    }

    pub fn current_context(&self) -> Option<Address> {
        self.current
    }

    pub fn call_stack(&self) -> &[Address] {
        &self.call_stack
    }

    /// Replace the call stack from a description such as `main -> 0xa.. -> 0xb..`.
    pub fn update_stack(&mut self, description: &str) -> Result<()> {
        let mut stack = Vec::new();
        for entry in description.split('>') {
            let entry = entry.trim_matches(|c: char| c.is_whitespace() || c == '-');
            if entry.is_empty() || entry == MAIN {
                continue;
            }
            let address: Address =
                entry.parse().wrap_err_with(|| format!("invalid contract address `{entry}`"))?;
            stack.push(address);
        }

        self.call_stack = stack;
        Ok(())
    }

    /// Display adapter for the call stack.
    pub fn stack(&self) -> CallStackDisplay<'_> {
        CallStackDisplay(&self.call_stack)
    }
}

/// Renders a call stack as `main -> 0x.. -> 0x..`, or `[main]` when empty.
#[derive(Clone, Copy, Debug)]
pub struct CallStackDisplay<'a>(&'a [Address]);

impl Display for CallStackDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "[{MAIN}]");
        }
        f.write_str(MAIN)?;
        for address in self.0 {
            write!(f, " -> {address}")?;
        }
        Ok(())
    }
}

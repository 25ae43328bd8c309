use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelArg {
    KeyValue { key: String, value: String },
    Flag(String),
}

impl KernelArg {
    pub fn parse(s: impl AsRef<str>) -> Self {
        match s.as_ref().split_once('=') {
            Some((key, value)) => Self::KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            },
            None => Self::Flag(s.as_ref().to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::KeyValue { key, .. } => key,
            Self::Flag(name) => name,
        }
    }
}

impl fmt::Display for KernelArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyValue { key, value } => write!(f, "{key}={value}"),
            Self::Flag(name) => f.write_str(name),
        }
    }
}

/// Ordered, key-unique kernel command line for Linux guests.
///
/// Setting a key that is already present drops the earlier entry and appends
/// the new one, so later sources win.
#[derive(Debug, Clone, Default)]
pub struct KernelCmdline {
    args: Vec<KernelArg>,
}

impl KernelCmdline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults every utility VM kernel boots with: quiet, no PCI probing,
    /// no ramdisk devices, no PM timer, and the vCPU count pinned.
    pub fn utility_vm_defaults(cpu_count: u32) -> Self {
        let mut cmdline = Self::new();
        cmdline
            .flag("quiet")
            .arg("pci", "off")
            .arg("brd.rd_nr", "0")
            .arg("pmtmr", "0")
            .arg("nr_cpus", cpu_count.to_string());
        cmdline
    }

    pub fn arg(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.add(KernelArg::KeyValue {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn flag(&mut self, name: impl Into<String>) -> &mut Self {
        self.add(KernelArg::Flag(name.into()))
    }

    pub fn add(&mut self, arg: KernelArg) -> &mut Self {
        self.args.retain(|a| a.key() != arg.key());
        self.args.push(arg);
        self
    }

    /// Appends raw `key=value` / `flag` strings, replacing keys already set.
    pub fn extend_raw<I, S>(&mut self, raw: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in raw {
            for token in item.as_ref().split_whitespace() {
                self.add(KernelArg::parse(token));
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            KernelArg::KeyValue { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.args.iter().any(|a| a.key() == key)
    }

    pub fn build(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

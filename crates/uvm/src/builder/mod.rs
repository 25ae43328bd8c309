mod vm_builder;

pub use vm_builder::UvmBuilder;

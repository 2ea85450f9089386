use std::path::Path;

/// Function context used before any function is declared.
pub const BOOTSTRAP_CONTEXT: &str = "$boot";

/// Naming state threaded through a translation run.
///
/// `module` namespaces static variables, `function` namespaces labels.
/// `label_index` numbers the labels the generator invents itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenState {
    pub module: String,
    pub function: String,
    pub label_index: usize,
}

impl GenState {
    pub fn enter_module(&mut self, path: &str) {
        let bare = Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(path);

        self.module = bare.to_string();
        self.function = bare.to_string();
        self.label_index = 0;
    }

    pub fn enter_function(&mut self, name: &str) {
        self.function = name.to_string();
        self.label_index = 0;
    }

    /// `<function>:<n>`, fresh on every call.
    pub fn next_local_label(&mut self) -> String {
        let label = format!("{}:{}", self.function, self.label_index);
        self.label_index += 1;
        label
    }

    /// `<function>$<label>` for a label written in the source.
    pub fn scoped_label(&self, label: &str) -> String {
        format!("{}${}", self.function, label)
    }

    /// `<module>.<index>`
    pub fn static_symbol(&self, index: u16) -> String {
        format!("{}.{}", self.module, index)
    }
}

//! Derived names.

/// Run-specific bus exchange name.
///
/// Drops `-`, `:` and `Z`, turns `T` and `.` into `-`, and prepends `prefix`:
/// `"2020-06-03T04:05:06.789Z"` becomes `"<prefix>20200603-040506-789"`.
pub fn endpoint_name(prefix: &str, simulation_id: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + simulation_id.len());
    name.push_str(prefix);
    for c in simulation_id.chars() {
        match c {
            '-' | ':' | 'Z' => {}
            'T' | '.' => name.push('-'),
            other => name.push(other),
        }
    }
    name
}

/// Per-unit log file: `"_<unit>"` goes before the last `.`, or at the end if there is none.
pub fn component_log_filename(base: &str, unit: &str) -> String {
    match base.rfind('.') {
        Some(dot) => format!("{}_{unit}{}", &base[..dot], &base[dot..]),
        None => format!("{base}_{unit}"),
    }
}

/// Unit names of one instance: the bare name for one copy, `<name>_1..<name>_n` otherwise.
pub fn expand_instance(instance: &str, count: u32) -> Vec<String> {
    match count {
        0 => Vec::new(),
        1 => vec![instance.to_string()],
        n => (1..=n).map(|i| format!("{instance}_{i}")).collect(),
    }
}

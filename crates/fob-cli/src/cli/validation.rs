/// Parse and validate a global variable name for IIFE output.
///
/// Ensures the name is a valid JavaScript identifier:
/// - Must start with a letter, underscore, or dollar sign
/// - Can contain letters, numbers, underscores, or dollar signs
/// - Cannot be empty
///
/// # Examples
///
/// Valid identifiers: MyLibrary, _internal, $wasm, lib123
/// Invalid identifiers: 123abc, my-lib, my.lib, ""
pub fn parse_global(s: &str) -> Result<String, String> {
    let Some(first) = s.chars().next() else {
        return Err("Global name cannot be empty".to_string());
    };

    if !first.is_alphabetic() && first != '_' && first != '$' {
        return Err(format!(
            "Global name must start with a letter, underscore, or dollar sign: '{}'",
            s
        ));
    }

    for c in s.chars() {
        if !c.is_alphanumeric() && c != '_' && c != '$' {
            return Err(format!(
                "Global name can only contain letters, numbers, underscores, or dollar signs: '{}'",
                s
            ));
        }
    }

    Ok(s.to_string())
}

/// Parse a positive job count.
pub fn parse_jobs(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("Job count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid job count: '{}'", s)),
    }
}

/// Resource limits to prevent abuse and keep validation bounded
///
/// These limits protect against pathological inputs while being generous enough
/// for all legitimate rule bases.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum source size in bytes
    pub max_file_size_bytes: usize,

    /// Maximum constraint/argument nesting accepted by the parser
    pub max_expression_depth: usize,

    /// Maximum recursion depth of the semantic validator
    pub max_validation_depth: usize,

    /// Maximum decoded size of a base64 operator payload
    pub max_decoded_operator_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024, // 5 MB
            max_expression_depth: 256,
            max_validation_depth: 100,
            max_decoded_operator_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

impl ResourceLimits {
    /// Create a new ResourceLimits with default values
    pub fn new() -> Self {
        Self::default()
    }
}

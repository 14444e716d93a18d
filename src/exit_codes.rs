//! Process exit codes. Each failing stage of a run has its own code so that
//! scripts can tell a bad credential from a bad template.

/// The post was generated and every artifact was written.
pub const SUCCESS: i32 = 0;

/// Bad arguments or an unreadable project file.
pub const USAGE_ERROR: i32 = 1;

/// A required input is missing: credential, instructions, or template.
pub const PRECONDITION_FAILURE: i32 = 2;

/// The text-generation backend couldn't be reached or returned nothing.
pub const GENERATION_FAILURE: i32 = 3;

/// The backend's text isn't a valid post.
pub const MALFORMED_RESPONSE: i32 = 4;

/// The template page can't be split into header and footer.
pub const LAYOUT_FAILURE: i32 = 5;

/// An artifact couldn't be staged or written.
pub const WRITE_FAILURE: i32 = 6;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USAGE_ERROR,
            PRECONDITION_FAILURE,
            GENERATION_FAILURE,
            MALFORMED_RESPONSE,
            LAYOUT_FAILURE,
            WRITE_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}

//! Token condition evaluation

use facetkit_types::Token;

/// Evaluate a pair of token requirements against a token list
///
/// Returns false if any `require_absent` token is present, else false if any
/// `require_present` token is missing, else true. Empty requirements always
/// pass.
pub fn eval_cond(require_present: &[Token], require_absent: &[Token], tokens: &[Token]) -> bool {
    if require_absent.iter().any(|t| tokens.contains(t)) {
        return false;
    }
    require_present.iter().all(|t| tokens.contains(t))
}

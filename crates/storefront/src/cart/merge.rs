//! Login merge of the local cart with the user's remote mirror.

use bazaar_core::CartItem;

/// Which branch of the login merge ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Both sides had lines; the union was written locally and remotely.
    Merged { remote_lines: usize, local_only: usize },
    /// The local cart was empty and took the remote lines.
    AdoptedRemote { lines: usize },
    /// The remote mirror was empty and received the local lines.
    PushedLocal { lines: usize },
    /// Both sides were empty.
    NothingToSync,
    /// The remote mirror could not be read; the local cart is unchanged.
    FetchFailed,
}

/// Union of `local` and `remote` by line identity.
///
/// Remote lines come first and win on conflict; local-only lines follow in
/// their local order. Returns the merged lines and how many were local-only.
pub fn merge_lines(local: &[CartItem], remote: &[CartItem]) -> (Vec<CartItem>, usize) {
    let mut merged = normalize(remote.to_vec());
    let before = merged.len();

    for item in local {
        if !merged.iter().any(|existing| existing.same_line(item)) {
            merged.push(item.clone());
        }
    }

    let local_only = merged.len() - before;
    (merged, local_only)
}

/// Drop zero-quantity lines and duplicate identities, keeping the first.
pub(super) fn normalize(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut lines: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity > 0 && !lines.iter().any(|line| line.same_line(&item)) {
            lines.push(item);
        }
    }
    lines
}

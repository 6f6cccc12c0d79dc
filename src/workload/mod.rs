//! Jobs built on top of [`Dataset`](crate::Dataset).
//!
//! # Example
//!
//! Counting the words of an in-memory text:
//! ```
//! # use anyhow::Result;
//! use wclite::workload::wc::{self, SplitPolicy};
//! use wclite::{Context, ContextConfig};
//! # fn main() -> Result<()> {
//! let ctx = Context::acquire(ContextConfig::local(2))?;
//! let lines = vec!["the cat sat".to_string(), "the cat ran".to_string()];
//! let counts = wc::count_words(&ctx, lines, SplitPolicy::SingleSpace)?;
//! assert_eq!(counts[0].count, 2);
//! assert_eq!(counts.iter().map(|wc| wc.count).sum::<u64>(), 6);
//! ctx.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod wc;

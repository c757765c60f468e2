//! Text helpers for rendering article data in a terminal.
//!
//! - **Width**: Unicode-aware display width and truncation
//! - **Sanitizing**: removal of control characters and ANSI escapes from
//!   server- or file-provided text
//!
//! # Examples
//!
//! ```
//! use newswave::util::{display_width, strip_control_chars, truncate_to_width};
//!
//! let title = strip_control_chars("\x1b[31mBreaking\x1b[0m: markets rally");
//! assert_eq!(title, "Breaking: markets rally");
//!
//! let cell = truncate_to_width(&title, 12);
//! assert!(display_width(&cell) <= 12);
//! ```

mod text;

pub use text::{display_width, single_line, strip_control_chars, truncate_to_width};

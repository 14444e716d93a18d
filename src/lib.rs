//! The library code for `postsplice`, which asks a text-generation backend
//! for a blog post and splices it into an existing static site. A run can be
//! broken down into three steps:
//!
//! 1. Splitting an existing page of the site into a reusable header and
//!    footer ([`crate::layout`])
//! 2. Requesting the post from the backend ([`crate::generate`])
//! 3. Writing the post page and updating the post index and the sitemap
//!    ([`crate::write`])
//!
//! The third step does the most work. The page is assembled from the layout
//! and the post ([`crate::page`]), the new entry is prepended to the JSON post
//! index ([`crate::index`]), and a `<url>` block is inserted into the sitemap
//! ([`crate::sitemap`]). All three new files are computed before any of them
//! is written, and a journal ([`crate::journal`]) marks a commit that didn't
//! finish.
//!
//! [`crate::publish::publish`] ties the steps together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod config;
pub mod exit_codes;
pub mod generate;
pub mod index;
pub mod journal;
pub mod layout;
pub mod page;
pub mod post;
pub mod publish;
pub mod sitemap;
pub mod util;
pub mod write;

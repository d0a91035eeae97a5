//! # chartsplice
//!
//! Regenerate a chart from a Notion database and splice it into a Notion
//! page, replacing the page's previous chart images in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌───────────┐   ┌──────────────┐
//! │ Aggregator │──▶│  Renderer   │──▶│   Relay   │──▶│   Splicer    │
//! │ Notion DB  │   │ QuickChart  │   │   Imgur   │   │ Notion page  │
//! └────────────┘   └─────────────┘   └───────────┘   └──────────────┘
//! ```
//!
//! One invocation runs the pipeline once, in sequence, and exits. Recurring
//! execution is left to an external trigger (cron, a scheduled function).
//!
//! ## Quick Start
//!
//! ```bash
//! export NOTION_API_KEY=secret_...
//! export IMGUR_CLIENT_ID=...
//! export NOTION_DATABASE_ID=...
//! export NOTION_PAGE_ID=...
//! chartsplice aggregate          # inspect the data points
//! chartsplice run                # full refresh
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Layered configuration (defaults, TOML, environment) |
//! | [`models`] | Core data types |
//! | [`decode`] | Typed decoding of property payloads |
//! | [`traits`] | Service traits for the remote collaborators |
//! | [`aggregate`] | Grouping and direct aggregation of rows |
//! | [`chart`] | Chart spec and Chart.js config |
//! | [`quickchart`] | QuickChart renderer |
//! | [`imgur`] | Imgur image host |
//! | [`notion`] | Notion data source and block store |
//! | [`splice`] | Image block splicing |
//! | [`pipeline`] | End-to-end refresh |
//! | [`commands`] | CLI command implementations |

pub mod aggregate;
pub mod chart;
pub mod commands;
pub mod config;
pub mod decode;
pub mod imgur;
pub mod models;
pub mod notion;
pub mod pipeline;
pub mod quickchart;
pub mod splice;
pub mod traits;

// src/lib.rs

#![doc = r#"
# marklive

marklive serves a directory tree of markdown documents over HTTP and pushes
a reload notification to connected browsers (via Server-Sent Events)
whenever a document changes on disk, so a viewer can refresh without
polling.

## Modules

- [`config`]: Configuration loading and merging from CLI, file, and environment.
- [`ignore`]: The ignore policy shared by the watcher and the listing.
- [`event`]: Raw filesystem event types crossing from the watch thread to the debouncer.
- [`watcher`]: Recursive watch manager and the debouncer that coalesces event bursts.
- [`hub`]: The broadcast hub fanning reload notifications out to subscribers.
- [`tree`]: Directory listing and path-checked document reads.
- [`web`]: The axum HTTP server, including the SSE streaming endpoint.

See the README for usage examples and more details.
"#]

pub mod config;
pub mod event;
pub mod hub;
pub mod ignore;
pub mod tree;
pub mod watcher;
pub mod web;

//! vaultctl - HashiCorp Vault CLI for LXC and Docker secret distribution.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── auth          # Login, logout, status, whoami
//! │   ├── secrets       # LXC credential CRUD (shared with docker)
//! │   ├── docker        # Docker env-var management and .env generation
//! │   ├── token         # Token info, renew, create, check
//! │   ├── compose       # Docker Compose integration
//! │   ├── repo          # APT repository management (reprepro)
//! │   ├── setup         # First-run wizard, APT server/client, systemd
//! │   ├── inject        # run / sh / scan / redact
//! │   ├── watch         # Poll a secret and restart on change
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── client        # Vault HTTP API client (KV v2, AppRole, tokens)
//!     ├── session       # Token cache and authentication fallback chain
//!     ├── secrets       # KV paths, merge-on-write, content hashing
//!     ├── envfile       # .env parsing and rendering
//!     ├── compose       # docker-compose detection and file editing
//!     ├── repo          # reprepro and GitHub release plumbing
//!     ├── onepassword   # `op` CLI integration
//!     ├── clipboard     # Clipboard tool detection
//!     └── templates     # Rendered config files for the setup commands
//! ```
//!
//! # Features
//!
//! - KV v2 secret storage with client-side merge-on-write
//! - AppRole and token authentication with a cached-token fallback chain
//! - .env generation for Docker Compose projects
//! - Self-hosted APT repository with GitHub release sync
//! - Token lifecycle management driven by a systemd timer

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

//! # corral-app - Orchestration Layer
//!
//! Wires `corral-core`'s domain types and `corral-daemon`'s process/port/probe
//! primitives into the running control plane: the event bus, the device and
//! plugin registries, the plugin orchestrator, the session manager, the
//! device-event trigger, the device listener, and the orchestrator root that
//! starts and stops all of them together.
//!
//! ## Public API
//!
//! ### Event bus (C2, §4.2)
//! - [`EventBus`], [`bus::EventKind`], [`bus::SubscriptionHandle`]
//!
//! ### Registries (C3/C6, §4.3/§4.6)
//! - [`DeviceRegistry`] - in-memory device/session map
//! - [`PluginRegistry`] - configuration-loaded plugin definitions
//!
//! ### Plugin orchestrator (C7, §4.7)
//! - [`PluginOrchestrator`], [`orchestrator::PluginState`], [`orchestrator::PluginInstance`]
//!
//! ### Session manager (C8, §4.8)
//! - [`SessionManager`]
//!
//! ### Device-event trigger (C10, §4.10)
//! - [`trigger::DeviceEventTrigger`]
//!
//! ### Device listener (C9, §4.9)
//! - [`device_listener`]
//!
//! ### Orchestrator root (C11, §4.11)
//! - [`OrchestratorRoot`]
//!
//! ### Ambient components (A3/A5)
//! - [`config::load`] - JSON configuration loader with `plugins.d` merging
//! - [`InstallLock`] - cross-process exclusive lock on the install folder

pub mod bus;
pub mod config;
pub mod device_listener;
pub mod device_registry;
pub mod install_lock;
pub mod orchestrator;
pub mod plugin_kind;
pub mod plugin_registry;
pub mod root;
pub mod session_manager;
pub mod trigger;

pub use bus::EventBus;
pub use device_registry::DeviceRegistry;
pub use install_lock::InstallLock;
pub use orchestrator::PluginOrchestrator;
pub use plugin_registry::PluginRegistry;
pub use root::OrchestratorRoot;
pub use session_manager::SessionManager;

/// Vulkan debug messenger - routes validation layer messages to the engine log
///
/// The messenger's user-data pointer carries a boxed [`MessengerState`], so
/// the callback reaches the same `Log` port as the rest of the engine without
/// any global. The box lives exactly as long as the messenger.

use ash::vk;
use gnve_engine::gnve::log::{Log, LogSeverity};
use gnve_engine::gnve::Result;
use gnve_engine::{engine_info, engine_warn};
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::vulkan_context::vk_check;

const SOURCE: &str = "gnve::vulkan::validation";

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Snapshot of the validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Engine severity of a validation message
pub fn severity_to_log(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Debug
    } else {
        LogSeverity::Trace
    }
}

/// Severities the messenger subscribes to for a minimum engine severity
pub fn severity_mask(min: LogSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let all = [
        (vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE, LogSeverity::Trace),
        (vk::DebugUtilsMessageSeverityFlagsEXT::INFO, LogSeverity::Debug),
        (vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, LogSeverity::Warn),
        (vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, LogSeverity::Error),
    ];
    all.iter()
        .filter(|(_, severity)| *severity >= min)
        .fold(vk::DebugUtilsMessageSeverityFlagsEXT::empty(), |mask, (flag, _)| mask | *flag)
}

pub fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// State reachable from the callback
pub(crate) struct MessengerState {
    log: Log,
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
    /// Occurrences per message id, to flag repeats
    repeats: Mutex<HashMap<String, u32>>,
}

impl MessengerState {
    fn new(log: Log) -> Self {
        Self {
            log,
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
            repeats: Mutex::new(HashMap::new()),
        }
    }

    fn count(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info | LogSeverity::Debug => &self.info,
            LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn occurrences(&self, message_id: &str) -> u32 {
        match self.repeats.lock() {
            Ok(mut repeats) => {
                let count = repeats.entry(message_id.to_string()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => 1,
        }
    }

    fn handle(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT, kind: &str, message_id: &str, message: &str) {
        let severity = severity_to_log(severity);
        self.count(severity);
        let seen = self.occurrences(message_id);
        let repeat = if seen > 1 { format!(" [x{}]", seen) } else { String::new() };
        self.log
            .log(severity, SOURCE, format!("[{}] {}{}: {}", kind, message_id, repeat, message));
    }

    fn stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }
}

unsafe fn c_str_or<'a>(ptr: *const std::ffi::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || user_data.is_null() {
        return vk::FALSE;
    }
    let state = &*(user_data as *const MessengerState);
    let callback_data = &*p_callback_data;
    let message_id = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");
    state.handle(message_severity, message_type_name(message_type), &message_id, &message);

    // Never abort the Vulkan call
    vk::FALSE
}

/// Debug-utils messenger forwarding to a [`Log`]
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    // Referenced by the driver through the user-data pointer
    state: Box<MessengerState>,
}

impl DebugMessenger {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance, log: &Log, min_severity: LogSeverity) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let state = Box::new(MessengerState::new(log.clone()));
        let user_data = &*state as *const MessengerState as *mut c_void;

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity_mask(min_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback))
            .user_data(user_data);

        let messenger = vk_check(log, "create debug messenger", unsafe {
            loader.create_debug_utils_messenger(&create_info, None)
        })?;
        engine_info!(log, SOURCE, "Validation messages at {} and above are logged", min_severity);

        Ok(Self {
            loader,
            messenger,
            state,
        })
    }

    pub fn stats(&self) -> ValidationStats {
        self.state.stats()
    }

    /// Log the counters, once, at shutdown
    pub fn report(&self) {
        let stats = self.stats();
        if stats.errors > 0 || stats.warnings > 0 {
            engine_warn!(
                self.state.log,
                SOURCE,
                "Validation summary: {} error(s), {} warning(s), {} total",
                stats.errors,
                stats.warnings,
                stats.total()
            );
        } else {
            engine_info!(self.state.log, SOURCE, "Validation summary: no errors or warnings");
        }
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        // The state box is freed after this, once the driver can no longer call back
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnve_engine::gnve::log::MemoryLogger;
    use std::sync::Arc;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity_to_log(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), LogSeverity::Error);
        assert_eq!(severity_to_log(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), LogSeverity::Warn);
        assert_eq!(severity_to_log(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), LogSeverity::Debug);
        assert_eq!(severity_to_log(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), LogSeverity::Trace);
    }

    #[test]
    fn test_mask_from_minimum_severity() {
        let warn = severity_mask(LogSeverity::Warn);
        assert!(warn.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(warn.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(!warn.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));

        let all = severity_mask(LogSeverity::Trace);
        assert!(all.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
        assert_eq!(severity_mask(LogSeverity::Error), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    }

    #[test]
    fn test_message_type_names() {
        assert_eq!(message_type_name(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION), "Validation");
        assert_eq!(message_type_name(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE), "Performance");
        assert_eq!(message_type_name(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), "General");
    }

    #[test]
    fn test_messages_reach_the_log_and_repeats_are_flagged() {
        let memory = Arc::new(MemoryLogger::new(16));
        let state = MessengerState::new(Log::new(memory.clone(), LogSeverity::Trace));

        state.handle(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, "Validation", "VUID-x", "bad barrier");
        state.handle(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, "Validation", "VUID-x", "bad barrier");
        state.handle(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, "Performance", "perf-y", "slow");

        let lines = memory.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("VUID-x: bad barrier"));
        assert!(lines[1].contains("[x2]"));
        assert_eq!(
            state.stats(),
            ValidationStats {
                errors: 2,
                warnings: 1,
                info: 0,
                verbose: 0
            }
        );
        assert_eq!(state.stats().total(), 3);
    }
}

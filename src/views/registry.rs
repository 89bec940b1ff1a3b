/// Which controller a route activates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Tasks,
    Results,
    Logs,
    Settings,
}

/// Static part of a view, shown before its initializer has fetched anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub title: &'static str,
    pub controls: &'static str,
    pub placeholder: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewEntry {
    pub key: &'static str,
    pub kind: ViewKind,
    pub shell: fn() -> Shell,
}

pub const DEFAULT_ROUTE: &str = "tasks";

fn tasks_shell() -> Shell {
    Shell {
        title: "Task management",
        controls: "new | start <id> | stop <id> | edit <id> | set <id> <field> <value> | save <id> | cancel <id> | delete <id> | toggle <id> on|off | criteria <id>",
        placeholder: "Loading tasks...",
    }
}

fn results_shell() -> Shell {
    Shell {
        title: "Results",
        controls: "file <name> | recommended on|off | sort capture|publish|price | order asc|desc | refresh | delete-file | json <n>",
        placeholder: "Loading result files...",
    }
}

fn logs_shell() -> Shell {
    Shell {
        title: "Live logs",
        controls: "refresh | auto on|off | clear | scroll top|bottom|up <n>|down <n>",
        placeholder: "Loading logs...",
    }
}

fn settings_shell() -> Shell {
    Shell {
        title: "System settings",
        controls: "prompt <file> | prompt-set <text> | prompt-save | notify-set <KEY> <value> | notify-save | ai-set <KEY> <value> | ai-save | ai-test | ai-test-backend",
        placeholder: "Loading settings...",
    }
}

/// Route table of the console
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    entries: Vec<ViewEntry>,
}

impl ViewRegistry {
    pub fn standard() -> Self {
        Self {
            entries: vec![
                ViewEntry {
                    key: "tasks",
                    kind: ViewKind::Tasks,
                    shell: tasks_shell,
                },
                ViewEntry {
                    key: "results",
                    kind: ViewKind::Results,
                    shell: results_shell,
                },
                ViewEntry {
                    key: "logs",
                    kind: ViewKind::Logs,
                    shell: logs_shell,
                },
                ViewEntry {
                    key: "settings",
                    kind: ViewKind::Settings,
                    shell: settings_shell,
                },
            ],
        }
    }

    /// Strip a leading `#`; an empty key means the default route
    pub fn normalize(route: &str) -> String {
        let key = route.trim().trim_start_matches('#').trim();
        if key.is_empty() {
            DEFAULT_ROUTE.to_string()
        } else {
            key.to_ascii_lowercase()
        }
    }

    pub fn lookup(&self, route: &str) -> Option<&ViewEntry> {
        let key = Self::normalize(route);
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.key)
    }

    pub fn not_found_shell() -> Shell {
        Shell {
            title: "Page not found",
            controls: "",
            placeholder: "Page not found. Use `go tasks`, `go results`, `go logs` or `go settings`.",
        }
    }

    /// Navigation bar with the active route marked
    pub fn nav_bar(&self, active: &str) -> String {
        self.keys()
            .map(|key| {
                if key == active {
                    format!("[{}]", key)
                } else {
                    format!(" {} ", key)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

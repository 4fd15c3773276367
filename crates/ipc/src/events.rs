use serde::Deserialize;

/// Events read from the compositor IPC event socket that the launcher cares
/// about. Everything else lands in `Unknown`.
#[derive(Debug, Clone)]
pub enum IpcEvent {
    Workspace(WorkspaceEvent),
    OpenWindow,
    CloseWindow,
    MoveWindow,
    MonitorFocused(String),
    /// An event we don't handle — carries the raw line for debugging.
    Unknown(String),
}

impl IpcEvent {
    /// `true` if this event can change which outputs count as occupied.
    #[must_use]
    pub fn affects_occupancy(&self) -> bool {
        !matches!(self, IpcEvent::Unknown(_))
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceEvent {
    pub id: i32,
    pub name: String,
}

/// JSON shape of one entry of the `j/monitors` reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorInfo {
    pub name: String,
    pub active_workspace: WorkspaceRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceRef {
    pub id: i32,
}

/// JSON shape of one entry of the `j/workspaces` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceInfo {
    pub id: i32,
    pub name: String,
    pub monitor: String,
    /// Number of windows currently in this workspace.
    pub windows: u32,
}

/// Parse a raw IPC event line into a typed [`IpcEvent`].
///
/// Event lines have the format `event_name>>event_data`.
#[must_use]
pub fn parse_event(line: &str) -> IpcEvent {
    let Some((event, data)) = line.split_once(">>") else {
        return IpcEvent::Unknown(line.to_string());
    };

    match event {
        "workspace" | "workspacev2" => {
            // workspacev2 format: "id,name"
            let (id_str, name) = data.split_once(',').unwrap_or((data, data));
            let id = id_str.trim().parse::<i32>().unwrap_or(0);
            IpcEvent::Workspace(WorkspaceEvent {
                id,
                name: name.trim().to_string(),
            })
        }
        "openwindow" => IpcEvent::OpenWindow,
        "closewindow" => IpcEvent::CloseWindow,
        "movewindow" | "movewindowv2" => IpcEvent::MoveWindow,
        "monitoradded" | "monitorfocused" => {
            IpcEvent::MonitorFocused(data.trim().to_string())
        }
        _ => IpcEvent::Unknown(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_workspacev2_event() {
        let event = parse_event("workspacev2>>3,coding");
        assert!(matches!(
            event,
            IpcEvent::Workspace(WorkspaceEvent { id: 3, .. })
        ));
        assert!(event.affects_occupancy());
    }

    #[test]
    fn parse_window_events() {
        assert!(matches!(
            parse_event("openwindow>>80e62df0,2,kitty,~"),
            IpcEvent::OpenWindow
        ));
        assert!(matches!(parse_event("closewindow>>80e62df0"), IpcEvent::CloseWindow));
    }

    #[test]
    fn parse_unknown_event() {
        let event = parse_event("somefutureevent>>data");
        assert!(matches!(event, IpcEvent::Unknown(_)));
        assert!(!event.affects_occupancy());
    }
}

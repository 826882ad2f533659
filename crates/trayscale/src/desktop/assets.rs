//! Files bundled into the executable.

use trayscale_core::TrayIcon;

pub const LICENSE: &str = include_str!("../../assets/LICENSE");

const ICON_ACTIVE: &[u8] = include_bytes!("../../assets/icons/active.png");
const ICON_INACTIVE: &[u8] = include_bytes!("../../assets/icons/inactive.png");
const ICON_EXIT_NODE: &[u8] = include_bytes!("../../assets/icons/exit-node.png");

pub fn tray_icon_png(icon: TrayIcon) -> &'static [u8] {
    match icon {
        TrayIcon::Active => ICON_ACTIVE,
        TrayIcon::Inactive => ICON_INACTIVE,
        TrayIcon::ExitNode => ICON_EXIT_NODE,
    }
}

use crate::base_system::context::safe_fs_name;

pub fn talent_folder_name(talent_name: &str) -> String {
    safe_fs_name(talent_name, "_", 120)
}

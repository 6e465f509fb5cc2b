// Folder tree assembly from a flat list of relative paths.

use std::collections::BTreeMap;

use quire_common::types::FileTreeNode;

#[derive(Default)]
struct DirBuilder {
    dirs: BTreeMap<String, DirBuilder>,
    files: Vec<String>,
}

impl DirBuilder {
    fn insert(&mut self, relative: &str) {
        let mut parts: Vec<&str> = relative.split('/').collect();
        let Some(file) = parts.pop() else {
            return;
        };
        let mut node = self;
        for part in parts {
            node = node.dirs.entry(part.to_string()).or_default();
        }
        node.files.push(file.to_string());
    }

    fn into_children(self, prefix: &str) -> Vec<FileTreeNode> {
        let join = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            }
        };

        let mut folders: Vec<(String, DirBuilder)> = self.dirs.into_iter().collect();
        folders.sort_by(|(a, _), (b, _)| by_lowercase(a, b));
        let mut files = self.files;
        files.sort_by(|a, b| by_lowercase(a, b));

        let mut children = Vec::with_capacity(folders.len() + files.len());
        for (name, builder) in folders {
            let path = join(&name);
            let nested = builder.into_children(&path);
            children.push(FileTreeNode::Folder { name, path, children: nested });
        }
        for name in files {
            let path = join(&name);
            children.push(FileTreeNode::File { name, path });
        }
        children
    }
}

fn by_lowercase(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Build a tree rooted at a folder named `root_name` with an empty path.
/// Folders come before files at every level.
pub fn build(root_name: &str, files: &[String]) -> FileTreeNode {
    let mut root = DirBuilder::default();
    for file in files {
        root.insert(file);
    }
    FileTreeNode::Folder {
        name: root_name.to_string(),
        path: String::new(),
        children: root.into_children(""),
    }
}

//! Linear lookups over a laid-out flamegraph.

use crate::model::Frame;

use super::{Flamegraph, FlamegraphFrame};

const LIBRARY_EXTENSIONS: [&str; 5] = [".dylib", ".so", ".a", ".dll", ".exe"];

/// Reduce a package path to its bare library name:
/// `/usr/lib/system/libdispatch.dylib` becomes `libdispatch`.
pub fn trim_package(package: &str) -> &str {
    let base = package
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(package);
    LIBRARY_EXTENSIONS
        .iter()
        .find_map(|ext| base.strip_suffix(ext))
        .unwrap_or(base)
}

/// Frame fields usable as a match key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameField {
    Name,
    File,
    Line,
    Column,
    Package,
    Module,
    IsApplication,
}

impl FrameField {
    fn matches(self, a: &Frame, b: &Frame) -> bool {
        match self {
            Self::Name => a.name == b.name,
            Self::File => a.file == b.file,
            Self::Line => a.line == b.line,
            Self::Column => a.column == b.column,
            Self::Package => {
                a.package.as_deref().map(trim_package) == b.package.as_deref().map(trim_package)
            }
            Self::Module => a.module == b.module,
            Self::IsApplication => a.is_application == b.is_application,
        }
    }
}

impl<'p> Flamegraph<'p> {
    /// Every visible frame named `name` whose package (or, lacking one, its
    /// module) matches `package` once both are trimmed.
    pub fn find_all_matching_frames(
        &self,
        name: &str,
        package: Option<&str>,
    ) -> Vec<&FlamegraphFrame> {
        let wanted = package.map(trim_package);
        self.frames()
            .filter(|f| {
                let Some(frame) = self.frame_info(f) else {
                    return false;
                };
                if frame.name.as_str() != name {
                    return false;
                }
                let owner = frame.package.as_deref().or(frame.module.as_deref());
                owner.map(trim_package) == wanted
            })
            .collect()
    }

    /// Every visible frame agreeing with `query` on all of `fields`.
    pub fn find_all_matching_frames_by(
        &self,
        query: &Frame,
        fields: &[FrameField],
    ) -> Vec<&FlamegraphFrame> {
        self.frames()
            .filter(|f| {
                self.frame_info(f)
                    .is_some_and(|frame| fields.iter().all(|field| field.matches(frame, query)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flamegraph::FlamegraphOptions;
    use crate::model::{
        FrameDescriptor, FrameIndex, FrameKey, FramePlatform, Profile, ProfileBuilder,
        ProfileKind, ProfileMeta, ProfileSource, ProfileUnit,
    };

    fn profile() -> Profile {
        let desc = |name: &str, file: &str, package: Option<&str>, module: Option<&str>| {
            FrameDescriptor {
                name: Some(name.to_string()),
                file: Some(file.to_string()),
                package: package.map(str::to_string),
                module: module.map(str::to_string),
                ..Default::default()
            }
        };
        let descs = [
            desc("main", "main.c", Some("/usr/bin/app"), None),
            desc("dispatch", "queue.c", Some("/usr/lib/libdispatch.dylib"), None),
            desc("dispatch", "queue.c", Some("/opt/lib/libdispatch.so"), None),
            desc("render", "view.js", None, Some("ui.view")),
        ];
        let index = FrameIndex::from_descriptors(&descs, FramePlatform::Native);
        let mut b = ProfileBuilder::new(
            &index,
            ProfileSource::Sampled,
            ProfileKind::Flamechart,
            ProfileMeta::new("p", ProfileUnit::Milliseconds),
        );
        for (stack, weight) in [(&[0u64, 1][..], 1.0), (&[0, 2], 1.0), (&[3], 2.0)] {
            let stack: Vec<_> = stack
                .iter()
                .map(|&i| index.resolve(FrameKey::Index(i)).unwrap())
                .collect();
            b.append_sample(&stack, weight).unwrap();
        }
        b.build()
    }

    #[test]
    fn trims_paths_and_library_extensions() {
        assert_eq!(trim_package("/usr/lib/system/libdispatch.dylib"), "libdispatch");
        assert_eq!(trim_package(r"C:\Windows\ntdll.dll"), "ntdll");
        assert_eq!(trim_package("app"), "app");
        assert_eq!(trim_package("libc.so"), "libc");
    }

    #[test]
    fn matches_name_and_trimmed_package() {
        let p = profile();
        let g = Flamegraph::new(&p, FlamegraphOptions::default()).unwrap();
        assert_eq!(g.find_all_matching_frames("dispatch", Some("libdispatch")).len(), 2);
        assert_eq!(g.find_all_matching_frames("dispatch", Some("/x/libdispatch.so")).len(), 2);
        assert!(g.find_all_matching_frames("dispatch", None).is_empty());
        assert_eq!(g.find_all_matching_frames("render", Some("ui.view")).len(), 1);
    }

    #[test]
    fn matches_arbitrary_fields() {
        let p = profile();
        let g = Flamegraph::new(&p, FlamegraphOptions::default()).unwrap();
        let dispatch = p.frames().iter().find(|f| f.name == "dispatch").unwrap();

        let by_name = g.find_all_matching_frames_by(dispatch, &[FrameField::Name]);
        assert_eq!(by_name.len(), 2);
        let by_file = g.find_all_matching_frames_by(dispatch, &[FrameField::File, FrameField::Line]);
        assert_eq!(by_file.len(), 2);
        let exact = g.find_all_matching_frames_by(dispatch, &[FrameField::Name, FrameField::Package]);
        assert_eq!(exact.len(), 2);
        let main = p.frames().iter().find(|f| f.name == "main").unwrap();
        assert_eq!(g.find_all_matching_frames_by(main, &[FrameField::Package]).len(), 1);
    }
}

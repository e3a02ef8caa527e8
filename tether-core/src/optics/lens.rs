//! Lens descriptors.
//!
//! A lens is resolved once, when it is handed to the engine, into one of the
//! [`Lens`] variants. Nothing downstream re-inspects the caller's original
//! argument.

/// One step of a path lens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Pass the current focus through unchanged.
    Identity,
    /// Object key.
    Prop(String),
    /// Array position; negative values count from the end.
    Index(isize),
}

/// A resolved lens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Lens {
    /// Focus on the whole target.
    #[default]
    Identity,
    Prop(String),
    Index(isize),
    /// A sequence of steps, applied left to right.
    Path(Vec<Segment>),
}

/// Borrowed form of a single step, shared by [`Segment`] and the
/// single-step [`Lens`] variants.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step<'a> {
    Identity,
    Prop(&'a str),
    Index(isize),
}

impl Segment {
    pub(crate) fn step(&self) -> Step<'_> {
        match self {
            Segment::Identity => Step::Identity,
            Segment::Prop(name) => Step::Prop(name),
            Segment::Index(index) => Step::Index(*index),
        }
    }
}

impl Lens {
    pub fn identity() -> Self {
        Lens::Identity
    }

    pub fn prop(name: impl Into<String>) -> Self {
        Lens::Prop(name.into())
    }

    pub fn index(index: isize) -> Self {
        Lens::Index(index)
    }

    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        Lens::Path(segments.into_iter().map(Into::into).collect())
    }

    /// The lens as a flat list of segments.
    pub fn into_segments(self) -> Vec<Segment> {
        match self {
            Lens::Identity => vec![Segment::Identity],
            Lens::Prop(name) => vec![Segment::Prop(name)],
            Lens::Index(index) => vec![Segment::Index(index)],
            Lens::Path(segments) => segments,
        }
    }

    /// Compose `self` then `next` into a single flattened path lens.
    ///
    /// The result is always [`Lens::Path`], whatever the shape of either side.
    pub fn then(self, next: Lens) -> Lens {
        let mut segments = self.into_segments();
        segments.extend(next.into_segments());
        Lens::Path(segments)
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::Prop(name.to_string())
    }
}

impl From<String> for Segment {
    fn from(name: String) -> Self {
        Segment::Prop(name)
    }
}

impl From<isize> for Segment {
    fn from(index: isize) -> Self {
        Segment::Index(index)
    }
}

/// Clamp a wide index into `isize`; anything beyond is out of range for
/// every array either way.
fn saturate(index: i64) -> isize {
    isize::try_from(index).unwrap_or(if index < 0 { isize::MIN } else { isize::MAX })
}

impl From<i32> for Segment {
    fn from(index: i32) -> Self {
        Segment::Index(saturate(index.into()))
    }
}

impl From<i64> for Segment {
    fn from(index: i64) -> Self {
        Segment::Index(saturate(index))
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        // Anything past isize::MAX is out of range for every array anyway.
        Segment::Index(isize::try_from(index).unwrap_or(isize::MAX))
    }
}

impl<T: Into<Segment>> From<Option<T>> for Segment {
    fn from(segment: Option<T>) -> Self {
        segment.map_or(Segment::Identity, Into::into)
    }
}

impl From<Segment> for Lens {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Identity => Lens::Identity,
            Segment::Prop(name) => Lens::Prop(name),
            Segment::Index(index) => Lens::Index(index),
        }
    }
}

impl From<Vec<Segment>> for Lens {
    fn from(segments: Vec<Segment>) -> Self {
        Lens::Path(segments)
    }
}

impl From<&str> for Lens {
    fn from(name: &str) -> Self {
        Segment::from(name).into()
    }
}

impl From<String> for Lens {
    fn from(name: String) -> Self {
        Segment::from(name).into()
    }
}

impl From<isize> for Lens {
    fn from(index: isize) -> Self {
        Segment::from(index).into()
    }
}

impl From<i32> for Lens {
    fn from(index: i32) -> Self {
        Segment::from(index).into()
    }
}

impl From<i64> for Lens {
    fn from(index: i64) -> Self {
        Segment::from(index).into()
    }
}

impl From<usize> for Lens {
    fn from(index: usize) -> Self {
        Segment::from(index).into()
    }
}

impl<T: Into<Lens>> From<Option<T>> for Lens {
    fn from(lens: Option<T>) -> Self {
        lens.map_or(Lens::Identity, Into::into)
    }
}

/// Build a [`Lens::Path`] from a list of names, indices and segments.
///
/// ```rust
/// use tether_core::{path, Lens, Segment};
///
/// let lens = path!("todos", 0, "title");
/// assert_eq!(
///     lens,
///     Lens::Path(vec![
///         Segment::Prop("todos".into()),
///         Segment::Index(0),
///         Segment::Prop("title".into()),
///     ])
/// );
/// ```
#[macro_export]
macro_rules! path {
    ($($segment:expr),* $(,)?) => {
        $crate::optics::Lens::Path(vec![$($crate::optics::Segment::from($segment)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_conversions() {
        assert_eq!(Lens::from("foo"), Lens::Prop("foo".into()));
        assert_eq!(Lens::from(-1), Lens::Index(-1));
        assert_eq!(Lens::from(2usize), Lens::Index(2));
        assert_eq!(Lens::from(None::<&str>), Lens::Identity);
        assert_eq!(Segment::from(None::<i32>), Segment::Identity);
    }

    #[test]
    fn wide_indices_saturate() {
        assert_eq!(Segment::from(i64::MAX), Segment::Index(isize::MAX));
        assert_eq!(Segment::from(i64::MIN), Segment::Index(isize::MIN));
        assert_eq!(Lens::from(usize::MAX), Lens::Index(isize::MAX));
        assert_eq!(Lens::from(-3i64), Lens::Index(-3));
        assert_eq!(Segment::from(i32::MIN), Segment::Index(i32::MIN as isize));
    }

    #[test]
    fn composing_single_steps_flattens() {
        let lens = Lens::from("foo").then(Lens::from(2));
        assert_eq!(lens, path!("foo", 2));
    }

    #[test]
    fn composing_paths_flattens() {
        let lens = path!("a", 1).then(path!("b", Segment::Identity));
        assert_eq!(
            lens.into_segments(),
            vec![
                Segment::Prop("a".into()),
                Segment::Index(1),
                Segment::Prop("b".into()),
                Segment::Identity,
            ]
        );
    }

    #[test]
    fn identity_keeps_its_place_when_composed() {
        let lens = Lens::identity().then(Lens::identity()).then(Lens::prop("a"));
        assert_eq!(
            lens,
            Lens::Path(vec![Segment::Identity, Segment::Identity, Segment::Prop("a".into())])
        );
    }
}

//! Helpers for ARM resource ids of the form
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/...]`.

/// Value of the segment following `label` (case-insensitive), e.g. `resourceGroups`.
fn segment_after<'a>(resource_id: &'a str, label: &str) -> Option<&'a str> {
    let mut segments = resource_id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case(label) {
            return segments.next().filter(|s| !s.is_empty());
        }
    }
    None
}

pub fn subscription_id(resource_id: &str) -> Option<&str> {
    segment_after(resource_id, "subscriptions")
}

pub fn resource_group_name(resource_id: &str) -> Option<&str> {
    segment_after(resource_id, "resourceGroups")
}

/// `/subscriptions/{sub}/resourceGroups/{rg}` prefix of a resource id.
pub fn resource_group_id(resource_id: &str) -> Option<String> {
    let subscription = subscription_id(resource_id)?;
    let group = resource_group_name(resource_id)?;
    Some(format!("/subscriptions/{}/resourceGroups/{}", subscription, group))
}

/// Last path segment, i.e. the resource name.
pub fn resource_name(resource_id: &str) -> Option<&str> {
    resource_id.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

//! Interactive numbered menu over a [`Directory`].
//!
//! The console is generic over its input and output so the whole loop can be
//! driven from a byte buffer in tests. Query failures have already been
//! logged by the facade; here they only turn into "No ... returned." lines.

use std::io::{self, BufRead, Write};
use tracing::{info, warn};

use crate::directory::Directory;
use crate::models::{Device, Group, User};
use crate::photos::{open_in_viewer, PhotoStore};

/// One entry of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// `0`: leave the loop.
    Exit,
    /// `1`: print the current app-only token.
    DisplayAccessToken,
    /// `2`: first page of users.
    ListUsers,
    /// `3`: save profile photos of the first page of users.
    DownloadProfilePhotos,
    /// `4`: members of every group.
    ListUsersByGroups,
    /// `5`: members of one picked group.
    ListUsersInSelectedGroup,
    /// `6`: groups of one picked user.
    ListGroupsForSelectedUser,
    /// `7`: devices owned by one picked user.
    ListDevicesForSelectedUser,
    /// `8`: devices in one picked domain.
    ListDevicesInSelectedDomain,
}

impl MenuChoice {
    /// Parses a trimmed menu number; anything outside 0–8 is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let choice = match input.trim().parse::<u8>().ok()? {
            0 => MenuChoice::Exit,
            1 => MenuChoice::DisplayAccessToken,
            2 => MenuChoice::ListUsers,
            3 => MenuChoice::DownloadProfilePhotos,
            4 => MenuChoice::ListUsersByGroups,
            5 => MenuChoice::ListUsersInSelectedGroup,
            6 => MenuChoice::ListGroupsForSelectedUser,
            7 => MenuChoice::ListDevicesForSelectedUser,
            8 => MenuChoice::ListDevicesInSelectedDomain,
            _ => return None,
        };
        Some(choice)
    }
}

const MENU: &str = "\
Please choose one of the following options:
1. Display access token
2. List users
3. Download profile photos
4. List users by all groups
5. List users by a selected group
6. List groups by a selected user
7. List devices by a selected user
8. List devices by a selected domain
0. Exit";

fn name_or<'a>(name: &'a Option<String>, fallback: &'a str) -> &'a str {
    name.as_deref().unwrap_or(fallback)
}

/// Menu loop state: I/O handles plus photo and domain settings.
pub struct Console<R, W> {
    input: R,
    out: W,
    photos: PhotoStore,
    open_viewer: bool,
    domains: Vec<String>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// Console reading choices from `input` and writing to `out`.
    pub fn new(input: R, out: W, photos: PhotoStore) -> Self {
        Console {
            input,
            out,
            photos,
            open_viewer: false,
            domains: Vec::new(),
        }
    }

    /// Open each saved photo in the default viewer.
    pub fn open_viewer(mut self, open: bool) -> Self {
        self.open_viewer = open;
        self
    }

    /// Domains offered by menu entry 8.
    pub fn domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    /// Consumes the console and returns its output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.out, "{text}")?;
        self.out.flush()?;
        self.read_line()
    }

    /// Prints a numbered list and returns the zero-based pick, or `None`
    /// after reporting an invalid selection.
    fn select<T>(
        &mut self,
        heading: &str,
        items: &[T],
        label: impl Fn(&T) -> String,
        prompt: &str,
    ) -> io::Result<Option<usize>> {
        writeln!(self.out, "{heading}:")?;
        for (i, item) in items.iter().enumerate() {
            writeln!(self.out, "{}. {}", i + 1, label(item))?;
        }
        let picked = self
            .prompt(prompt)?
            .and_then(|line| line.parse::<usize>().ok())
            .filter(|n| (1..=items.len()).contains(n));
        match picked {
            Some(n) => Ok(Some(n - 1)),
            None => {
                writeln!(self.out, "Invalid selection.")?;
                Ok(None)
            }
        }
    }

    /// Runs until the user picks 0 or input ends.
    pub async fn run(&mut self, directory: &Directory) -> io::Result<()> {
        loop {
            writeln!(self.out)?;
            writeln!(self.out, "{MENU}")?;
            writeln!(self.out)?;
            let Some(line) = self.prompt("Enter your choice here: ")? else {
                writeln!(self.out)?;
                writeln!(self.out, "Goodbye...")?;
                return Ok(());
            };

            match MenuChoice::parse(&line) {
                Some(MenuChoice::Exit) => {
                    writeln!(self.out, "Goodbye...")?;
                    return Ok(());
                }
                Some(choice) => {
                    info!(?choice, "menu selection");
                    self.dispatch(choice, directory).await?;
                }
                None => writeln!(self.out, "Invalid choice! Please try again.")?,
            }
        }
    }

    async fn dispatch(&mut self, choice: MenuChoice, directory: &Directory) -> io::Result<()> {
        match choice {
            MenuChoice::Exit => Ok(()),
            MenuChoice::DisplayAccessToken => self.display_access_token(directory).await,
            MenuChoice::ListUsers => self.list_users(directory).await,
            MenuChoice::DownloadProfilePhotos => self.download_profile_photos(directory).await,
            MenuChoice::ListUsersByGroups => self.list_users_by_groups(directory).await,
            MenuChoice::ListUsersInSelectedGroup => {
                self.list_users_in_selected_group(directory).await
            }
            MenuChoice::ListGroupsForSelectedUser => {
                self.list_groups_for_selected_user(directory).await
            }
            MenuChoice::ListDevicesForSelectedUser => {
                self.list_devices_for_selected_user(directory).await
            }
            MenuChoice::ListDevicesInSelectedDomain => {
                self.list_devices_in_selected_domain(directory).await
            }
        }
    }

    async fn display_access_token(&mut self, directory: &Directory) -> io::Result<()> {
        match directory.access_token().await {
            Ok(token) => writeln!(self.out, "App-only token: {token}"),
            Err(_) => writeln!(self.out, "No token returned."),
        }
    }

    fn write_users(&mut self, users: &[User], indent: &str) -> io::Result<()> {
        for user in users {
            writeln!(self.out, "{indent} User: {}", name_or(&user.display_name, "NO NAME"))?;
            writeln!(self.out, "{indent}   ID: {}", user.id)?;
            writeln!(self.out, "{indent}Email: {}", name_or(&user.mail, "NO EMAIL"))?;
        }
        Ok(())
    }

    fn write_named<T>(
        &mut self,
        kind: &str,
        items: &[T],
        fields: impl Fn(&T) -> (&Option<String>, &str),
    ) -> io::Result<()> {
        for item in items {
            let (name, id) = fields(item);
            writeln!(self.out, "    {kind}: {}", name_or(name, "NO NAME"))?;
            writeln!(self.out, "      ID: {id}")?;
        }
        Ok(())
    }

    async fn list_users(&mut self, directory: &Directory) -> io::Result<()> {
        let Ok(page) = directory.list_users().await else {
            return writeln!(self.out, "No results returned.");
        };
        self.write_users(&page.items, "")?;
        writeln!(self.out, "More users available? {}", page.has_more())
    }

    async fn download_profile_photos(&mut self, directory: &Directory) -> io::Result<()> {
        let Ok(page) = directory.list_users().await else {
            return writeln!(self.out, "No results returned.");
        };

        let mut saved = 0usize;
        for user in &page.items {
            let photo = match directory.get_user_photo(&user.id).await {
                Ok(Some(photo)) => photo,
                Ok(None) | Err(_) => continue,
            };
            let path = match self.photos.save(&user.id, &photo) {
                Ok(path) => path,
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "failed to save profile photo");
                    writeln!(self.out, "Could not save profile photo for {}: {e}", user.id)?;
                    continue;
                }
            };
            saved += 1;
            writeln!(self.out, "Saved {}", path.display())?;

            if self.open_viewer {
                if let Err(e) = open_in_viewer(&path) {
                    warn!(path = %path.display(), error = %e, "failed to open photo viewer");
                    writeln!(self.out, "Saved, but could not open {}: {e}", path.display())?;
                }
            }
        }

        writeln!(
            self.out,
            "{saved} profile photo(s) downloaded and stored in {}.",
            self.photos.directory().display()
        )
    }

    async fn list_users_by_groups(&mut self, directory: &Directory) -> io::Result<()> {
        let users_by_group = match directory.list_users_by_group().await {
            Ok(map) if !map.is_empty() => map,
            _ => return writeln!(self.out, "No results returned."),
        };
        for (group, users) in users_by_group.iter() {
            writeln!(self.out, "Group: {group} ({} members)", users.len())?;
            self.write_users(users, "   ")?;
        }
        Ok(())
    }

    async fn list_users_in_selected_group(&mut self, directory: &Directory) -> io::Result<()> {
        let groups = match directory.list_groups().await {
            Ok(groups) if !groups.is_empty() => groups,
            _ => return writeln!(self.out, "No groups returned."),
        };
        let Some(index) = self.select(
            "Groups",
            &groups,
            |g: &Group| name_or(&g.display_name, "NO NAME").to_string(),
            "Select a group by number: ",
        )?
        else {
            return Ok(());
        };
        let group = &groups[index];
        let group_name = name_or(&group.display_name, "NO NAME");

        match directory.list_users_in_group(&group.id).await {
            Ok(users) if !users.is_empty() => {
                writeln!(self.out, "Group: {group_name} ({} members)", users.len())?;
                self.write_users(&users, "   ")
            }
            _ => writeln!(
                self.out,
                "No users returned for the selected group - {group_name} (ID: {}).",
                group.id
            ),
        }
    }

    /// Shared first half of menu entries 6 and 7.
    async fn select_user(&mut self, directory: &Directory) -> io::Result<Option<User>> {
        let mut users = match directory.list_all_users().await {
            Ok(users) if !users.is_empty() => users,
            _ => {
                writeln!(self.out, "No users returned.")?;
                return Ok(None);
            }
        };
        let picked = self.select(
            "Users",
            &users,
            |u: &User| name_or(&u.display_name, "NO NAME").to_string(),
            "Select a user by number: ",
        )?;
        Ok(picked.map(|i| users.swap_remove(i)))
    }

    async fn list_groups_for_selected_user(&mut self, directory: &Directory) -> io::Result<()> {
        let Some(user) = self.select_user(directory).await? else {
            return Ok(());
        };
        let user_name = name_or(&user.display_name, "NO NAME");
        match directory.list_groups_for_user(&user.id).await {
            Ok(groups) if !groups.is_empty() => {
                writeln!(self.out, "User: {user_name} ({} group memberships)", groups.len())?;
                self.write_named("Group", &groups, |g| (&g.display_name, g.id.as_str()))
            }
            _ => writeln!(
                self.out,
                "No groups returned for the selected user - {user_name} (ID: {}).",
                user.id
            ),
        }
    }

    async fn list_devices_for_selected_user(&mut self, directory: &Directory) -> io::Result<()> {
        let Some(user) = self.select_user(directory).await? else {
            return Ok(());
        };
        let user_name = name_or(&user.display_name, "NO NAME");
        match directory.list_devices_for_user(&user.id).await {
            Ok(devices) if !devices.is_empty() => {
                writeln!(self.out, "User: {user_name} ({} devices)", devices.len())?;
                self.write_devices(&devices)
            }
            _ => writeln!(
                self.out,
                "No devices returned for the selected user - {user_name} (ID: {}).",
                user.id
            ),
        }
    }

    fn write_devices(&mut self, devices: &[Device]) -> io::Result<()> {
        self.write_named("Device", devices, |d| (&d.display_name, d.id.as_str()))
    }

    fn pick_domain(&mut self) -> io::Result<Option<String>> {
        if self.domains.is_empty() {
            let domain = self.prompt("Enter a domain name: ")?.unwrap_or_default();
            if domain.is_empty() {
                writeln!(self.out, "Invalid selection.")?;
                return Ok(None);
            }
            return Ok(Some(domain));
        }
        let domains = self.domains.clone();
        let picked = self.select(
            "Domains",
            &domains,
            |d: &String| d.clone(),
            "Select a domain by number: ",
        )?;
        Ok(picked.map(|i| domains[i].clone()))
    }

    async fn list_devices_in_selected_domain(&mut self, directory: &Directory) -> io::Result<()> {
        let Some(domain) = self.pick_domain()? else {
            return Ok(());
        };
        match directory.list_devices_in_domain(&domain).await {
            Ok(devices) if !devices.is_empty() => {
                writeln!(self.out, "Domain: {domain} ({} devices)", devices.len())?;
                self.write_devices(&devices)
            }
            _ => writeln!(self.out, "No devices returned for the selected domain - {domain}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialManager;
    use std::io::Cursor;
    use std::sync::Arc;

    async fn run_with(input: &str, directory: &Directory) -> String {
        let dir = tempfile::tempdir().unwrap();
        let mut console = Console::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            PhotoStore::new(dir.path()),
        );
        console.run(directory).await.unwrap();
        String::from_utf8(console.into_output()).unwrap()
    }

    fn uninitialized() -> Directory {
        Directory::new(Arc::new(CredentialManager::new()))
    }

    #[test]
    fn parse_accepts_only_menu_numbers() {
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse(" 8 \n"), Some(MenuChoice::ListDevicesInSelectedDomain));
        assert_eq!(MenuChoice::parse("9"), None);
        assert_eq!(MenuChoice::parse("99"), None);
        assert_eq!(MenuChoice::parse("-1"), None);
        assert_eq!(MenuChoice::parse("two"), None);
        assert_eq!(MenuChoice::parse(""), None);
    }

    #[tokio::test]
    async fn invalid_input_reprompts() {
        let output = run_with("99\nabc\n\n0\n", &uninitialized()).await;
        assert_eq!(output.matches("Invalid choice! Please try again.").count(), 3);
        assert_eq!(output.matches("Enter your choice here: ").count(), 4);
        assert!(output.ends_with("Goodbye...\n"));
    }

    #[tokio::test]
    async fn end_of_input_exits_cleanly() {
        let output = run_with("", &uninitialized()).await;
        assert!(output.contains("Goodbye..."));
    }

    #[tokio::test]
    async fn queries_before_initialize_report_no_results() {
        let output = run_with("1\n2\n3\n4\n5\n6\n0\n", &uninitialized()).await;
        assert!(output.contains("No token returned."));
        assert!(output.matches("No results returned.").count() >= 3);
        assert!(output.contains("No groups returned."));
        assert!(output.contains("No users returned."));
        assert!(output.ends_with("Goodbye...\n"));
    }

    #[tokio::test]
    async fn free_text_domain_prompt_when_none_configured() {
        let output = run_with("8\n\n0\n", &uninitialized()).await;
        assert!(output.contains("Enter a domain name: "));
        assert!(output.contains("Invalid selection."));
    }
}

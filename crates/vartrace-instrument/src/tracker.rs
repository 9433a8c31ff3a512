//! The C# tracker runtime appended to every instrumented program.
//!
//! `VarTracker` is the in-process half of the protocol: it numbers probe
//! firings, writes trace lines in the format of
//! [`vartrace_core::ValueRecord::to_line`] and hands back corrected values
//! from the expected trace. Run-specific paths come from the environment
//! (see [`ENV_RUN_ID`], [`ENV_TRACE_PATH`], [`ENV_EXPECTED_PATH`]), so one
//! instrumented artifact can be executed any number of times.
//!
//! The tracker does not write mismatch records; the collector and
//! comparator on the host side are the authority for those.

/// Name of the emitted static class.
pub const TRACKER_CLASS: &str = "VarTracker";

/// Environment variable carrying the run id.
pub const ENV_RUN_ID: &str = "VARTRACE_RUN_ID";
/// Environment variable naming the trace file to append to.
pub const ENV_TRACE_PATH: &str = "VARTRACE_TRACE_PATH";
/// Environment variable naming the expected-values file, if any.
pub const ENV_EXPECTED_PATH: &str = "VARTRACE_EXPECTED_PATH";

/// `using` directives the tracker needs.
pub const TRACKER_USINGS: [&str; 5] = [
    "System",
    "System.Collections.Generic",
    "System.Globalization",
    "System.IO",
    "System.Threading",
];

const TRACKER_SOURCE: &str = r#"
public static class VarTracker
{
    private static readonly object Gate = new object();
    private static readonly Dictionary<string, string> Expected = new Dictionary<string, string>();
    private static readonly Dictionary<long, HashSet<int>> ExpectedProbes = new Dictionary<long, HashSet<int>>();
    private static long step;
    private static string runId = "";
    private static string tracePath = "values.txt";

    public static void Initialize()
    {
        lock (Gate)
        {
            Interlocked.Exchange(ref step, 0);
            runId = Environment.GetEnvironmentVariable("@RUN_ID@") ?? "";
            tracePath = Environment.GetEnvironmentVariable("@TRACE_PATH@") ?? "values.txt";
            Expected.Clear();
            ExpectedProbes.Clear();
            string expectedPath = Environment.GetEnvironmentVariable("@EXPECTED_PATH@");
            if (!string.IsNullOrEmpty(expectedPath) && File.Exists(expectedPath))
            {
                foreach (string line in File.ReadAllLines(expectedPath))
                {
                    LoadExpected(line);
                }
            }
        }
    }

    public static string RunId { get { return runId; } }

    public static Dictionary<string, object> Track(int probeId, int line, params (string, object)[] values)
    {
        var corrections = new Dictionary<string, object>();
        lock (Gate)
        {
            // Numbered under the lock so steps appear in the file in order.
            long current = Interlocked.Increment(ref step);
            var records = new List<string>();
            foreach (var (name, value) in values)
            {
                string typeName;
                int rank;
                foreach (string payload in Serialize(value, out typeName, out rank))
                {
                    records.Add(current + "//" + probeId + "//" + name + "//" + typeName + "//" + rank + "//" + payload);
                }
            }
            File.AppendAllLines(tracePath, records);

            HashSet<int> probes;
            if (!ExpectedProbes.TryGetValue(current, out probes) || !probes.Contains(probeId))
            {
                // Either nothing is expected here or the expected trace is at
                // another probe for this step: nothing to substitute.
                return corrections;
            }
            foreach (var (name, value) in values)
            {
                string text;
                object parsed;
                if (value == null || !Expected.TryGetValue(Key(current, probeId, name), out text))
                {
                    continue;
                }
                if (TryParse(value.GetType(), text, out parsed) && Text(parsed) != Text(value))
                {
                    corrections[name] = parsed;
                }
            }
        }
        return corrections;
    }

    private static string Key(long s, int probeId, string name)
    {
        return s + "//" + probeId + "//" + name;
    }

    private static void LoadExpected(string line)
    {
        string[] head = line.Trim().Split(new[] { ' ', '\t' }, 4, StringSplitOptions.RemoveEmptyEntries);
        long s;
        int probeId;
        if (head.Length != 4
            || !long.TryParse(head[0], NumberStyles.Integer, CultureInfo.InvariantCulture, out s)
            || !int.TryParse(head[1], NumberStyles.Integer, CultureInfo.InvariantCulture, out probeId))
        {
            return;
        }
        Expected[Key(s, probeId, head[2])] = head[3].Trim();
        HashSet<int> probes;
        if (!ExpectedProbes.TryGetValue(s, out probes))
        {
            probes = new HashSet<int>();
            ExpectedProbes[s] = probes;
        }
        probes.Add(probeId);
    }

    private static List<string> Serialize(object value, out string typeName, out int rank)
    {
        var rows = new List<string>();
        if (value == null)
        {
            typeName = "unknown";
            rank = 0;
            rows.Add("null");
            return rows;
        }
        typeName = value.GetType().Name;
        var array = value as Array;
        if (array == null)
        {
            rank = 0;
            rows.Add(Format(value));
            return rows;
        }
        rank = array.Rank;
        if (array.Rank == 1)
        {
            var items = new List<string>();
            foreach (object item in array)
            {
                items.Add(Format(item));
            }
            rows.Add(string.Join(",", items));
            return rows;
        }
        for (int r = 0; r < array.GetLength(0); r++)
        {
            var cells = new List<string>();
            for (int c = 0; c < array.GetLength(1); c++)
            {
                cells.Add(Format(array.GetValue(r, c)));
            }
            rows.Add(string.Join(",", cells));
        }
        return rows;
    }

    private static string Text(object value)
    {
        string typeName;
        int rank;
        return string.Join(";", Serialize(value, out typeName, out rank));
    }

    private static string Format(object value)
    {
        if (value is float)
        {
            return ((float)value).ToString("R", CultureInfo.InvariantCulture);
        }
        if (value is double)
        {
            return ((double)value).ToString("R", CultureInfo.InvariantCulture);
        }
        var formattable = value as IFormattable;
        return formattable != null
            ? formattable.ToString(null, CultureInfo.InvariantCulture)
            : Convert.ToString(value, CultureInfo.InvariantCulture);
    }

    private static bool TryParse(Type type, string text, out object parsed)
    {
        parsed = null;
        if (!type.IsArray)
        {
            return TryParseElement(type, text, true, out parsed);
        }
        Type element = type.GetElementType();
        if (type.GetArrayRank() == 1)
        {
            string[] items = text.Split(new[] { ',' }, StringSplitOptions.RemoveEmptyEntries);
            Array vector = Array.CreateInstance(element, items.Length);
            for (int i = 0; i < items.Length; i++)
            {
                object item;
                if (!TryParseElement(element, items[i], false, out item))
                {
                    return false;
                }
                vector.SetValue(item, i);
            }
            parsed = vector;
            return true;
        }
        string[] rows = text.Split(new[] { ';' }, StringSplitOptions.RemoveEmptyEntries);
        int columns = rows.Length == 0 ? 0 : rows[0].Split(new[] { ',' }, StringSplitOptions.RemoveEmptyEntries).Length;
        Array matrix = Array.CreateInstance(element, rows.Length, columns);
        for (int r = 0; r < rows.Length; r++)
        {
            string[] cells = rows[r].Split(new[] { ',' }, StringSplitOptions.RemoveEmptyEntries);
            if (cells.Length != columns)
            {
                return false;
            }
            for (int c = 0; c < columns; c++)
            {
                object cell;
                if (!TryParseElement(element, cells[c], false, out cell))
                {
                    return false;
                }
                matrix.SetValue(cell, r, c);
            }
        }
        parsed = matrix;
        return true;
    }

    private static bool TryParseElement(Type type, string raw, bool allowDecimalComma, out object parsed)
    {
        parsed = null;
        string text = raw.Trim();
        if (type == typeof(int))
        {
            int v;
            if (!int.TryParse(text, NumberStyles.Integer, CultureInfo.InvariantCulture, out v)) return false;
            parsed = v;
            return true;
        }
        if (type == typeof(float) || type == typeof(double))
        {
            if (allowDecimalComma)
            {
                text = text.Replace(',', '.');
            }
            double v;
            if (!double.TryParse(text, NumberStyles.Float, CultureInfo.InvariantCulture, out v)) return false;
            parsed = type == typeof(float) ? (object)(float)v : v;
            return true;
        }
        if (type == typeof(char))
        {
            string inner = Unquote(text, '\'');
            if (inner.Length != 1) return false;
            parsed = inner[0];
            return true;
        }
        if (type == typeof(string))
        {
            parsed = Unquote(text, '"');
            return true;
        }
        return false;
    }

    private static string Unquote(string text, char quote)
    {
        if (text.Length >= 2 && text[0] == quote && text[text.Length - 1] == quote)
        {
            return text.Substring(1, text.Length - 2);
        }
        return text;
    }
}
"#;

/// The tracker class source, with environment variable names filled in.
pub fn tracker_source() -> String {
    TRACKER_SOURCE
        .replace("@RUN_ID@", ENV_RUN_ID)
        .replace("@TRACE_PATH@", ENV_TRACE_PATH)
        .replace("@EXPECTED_PATH@", ENV_EXPECTED_PATH)
}

/// `using` directives from [`TRACKER_USINGS`] not already present in
/// `existing` (a list of namespaces the file imports).
pub fn missing_usings(existing: &[&str]) -> Vec<&'static str> {
    TRACKER_USINGS
        .iter()
        .copied()
        .filter(|ns| !existing.contains(ns))
        .collect()
}
